//! Commands mutating users.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::{
    Error, Handler, Request, RequestContext, RequestKind, ValidationFailure, Validator,
};

use super::unit_of_work::UsersUnitOfWork;
use super::user::{Email, NAME_MAX, PHONE_MAX, User, UserId, UserProfile};

/// Register a new user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl Request for CreateUser {
    type Response = UserId;
    const KIND: RequestKind = RequestKind::Command;
    const MODULE: &'static str = module_path!();
    const NAME: &'static str = "CreateUser";
}

/// Field rules for [`CreateUser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateUserValidator;

fn check_name(field: &str, label: &str, value: &str, failures: &mut Vec<ValidationFailure>) {
    if value.trim().is_empty() {
        failures.push(ValidationFailure::new(field, format!("{label} is required")));
    } else if value.chars().count() > NAME_MAX {
        failures.push(ValidationFailure::new(
            field,
            format!("{label} cannot exceed {NAME_MAX} characters"),
        ));
    }
}

impl CreateUserValidator {
    fn failures(request: &CreateUser) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        check_name("firstName", "First name", &request.first_name, &mut failures);
        check_name("lastName", "Last name", &request.last_name, &mut failures);
        if let Err(err) = Email::parse(request.email.as_str()) {
            failures.push(ValidationFailure::new("email", err.to_string()));
        }
        let phone_len = request
            .phone_number
            .as_deref()
            .map_or(0, |phone| phone.chars().count());
        if phone_len > PHONE_MAX {
            failures.push(ValidationFailure::new(
                "phoneNumber",
                format!("Phone number cannot exceed {PHONE_MAX} characters"),
            ));
        }
        failures
    }
}

#[async_trait]
impl Validator<CreateUser> for CreateUserValidator {
    async fn validate(
        &self,
        request: &CreateUser,
        _cancel: &CancellationToken,
    ) -> Vec<ValidationFailure> {
        Self::failures(request)
    }
}

/// Stores a new user unless the email is already taken.
#[derive(Clone)]
pub struct CreateUserHandler {
    clock: Arc<dyn Clock + Send + Sync>,
}

impl CreateUserHandler {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Handler<CreateUser> for CreateUserHandler {
    async fn handle(&self, request: CreateUser, ctx: &RequestContext) -> Result<UserId, Error> {
        let unit = ctx
            .unit_of_work_as::<UsersUnitOfWork>(CreateUser::MODULE)
            .await?;
        let session = unit.session();

        let email = Email::parse(request.email)
            .map_err(|err| Error::invalid_field("email", err.to_string()))?;
        if session.find_by_email(&email).await?.is_some() {
            return Err(Error::business_rule(
                "unique_email",
                format!("User with email '{email}' already exists."),
            ));
        }

        let profile = UserProfile {
            first_name: request.first_name.trim().to_owned(),
            last_name: request.last_name.trim().to_owned(),
            email,
            phone_number: request
                .phone_number
                .map(|phone| phone.trim().to_owned())
                .filter(|phone| !phone.is_empty()),
        };
        let user = User::register(UserId::random(), profile, self.clock.utc());
        let id = user.id();
        session.add(user).await?;
        info!(user_id = %id, "user registered");
        Ok(id)
    }
}
