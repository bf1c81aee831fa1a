//! Read-only user queries.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    Error, Handler, Request, RequestContext, RequestKind, ValidationFailure, Validator,
};

use super::filter::{FIRST_PAGE, MAX_PAGE_SIZE, Page, UserFilter};
use super::unit_of_work::UsersUnitOfWork;
use super::user::{NAME_MAX, UserId, UserView};

/// Fetch one user by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetUser {
    pub id: UserId,
}

impl Request for GetUser {
    type Response = UserView;
    const KIND: RequestKind = RequestKind::Query;
    const MODULE: &'static str = module_path!();
    const NAME: &'static str = "GetUser";
}

/// List users page by page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUsers {
    pub filter: UserFilter,
}

impl Request for ListUsers {
    type Response = Page<UserView>;
    const KIND: RequestKind = RequestKind::Query;
    const MODULE: &'static str = module_path!();
    const NAME: &'static str = "ListUsers";
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetUserHandler;

#[async_trait]
impl Handler<GetUser> for GetUserHandler {
    async fn handle(&self, request: GetUser, ctx: &RequestContext) -> Result<UserView, Error> {
        let unit = ctx.unit_of_work_as::<UsersUnitOfWork>(GetUser::MODULE).await?;
        let user = unit
            .session()
            .find_by_id(request.id)
            .await?
            .ok_or_else(|| Error::resource_not_found("User", request.id))?;
        Ok(UserView::from(&user))
    }
}

/// Paging bounds for [`ListUsers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListUsersValidator;

#[async_trait]
impl Validator<ListUsers> for ListUsersValidator {
    async fn validate(
        &self,
        request: &ListUsers,
        _cancel: &CancellationToken,
    ) -> Vec<ValidationFailure> {
        let filter = &request.filter;
        let mut failures = Vec::new();
        if filter.page < FIRST_PAGE {
            failures.push(ValidationFailure::new(
                "page",
                format!("Page must be at least {FIRST_PAGE}"),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&filter.page_size) {
            failures.push(ValidationFailure::new(
                "pageSize",
                format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if filter
            .search
            .as_deref()
            .is_some_and(|term| term.chars().count() > NAME_MAX)
        {
            failures.push(ValidationFailure::new(
                "search",
                format!("Search term cannot exceed {NAME_MAX} characters"),
            ));
        }
        failures
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListUsersHandler;

#[async_trait]
impl Handler<ListUsers> for ListUsersHandler {
    async fn handle(
        &self,
        request: ListUsers,
        ctx: &RequestContext,
    ) -> Result<Page<UserView>, Error> {
        let unit = ctx.unit_of_work_as::<UsersUnitOfWork>(ListUsers::MODULE).await?;
        let slice = unit.session().list(&request.filter).await?;
        Ok(Page {
            items: slice.users.iter().map(UserView::from).collect(),
            total: slice.total,
            page: request.filter.page,
            page_size: request.filter.page_size,
        })
    }
}
