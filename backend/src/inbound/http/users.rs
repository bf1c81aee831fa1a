//! Users API handlers.
//!
//! ```text
//! POST /api/v1/users {"firstName":"Ada","lastName":"Lovelace","email":"ada@example.com"}
//! GET /api/v1/users/{id}
//! GET /api/v1/users?search=ada&isActive=true&page=1&pageSize=10
//! ```

use actix_web::http::header::LOCATION;
use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};

use crate::domain::Error;
use crate::modules::users::{CreateUser, GetUser, ListUsers, Page, UserFilter, UserId, UserView};

use super::error::ApiResult;
use super::state::Dispatch;

/// Body returned by `POST /api/v1/users`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: UserId,
}

/// Register a user.
#[post("/users")]
pub async fn create_user(
    dispatch: Dispatch,
    payload: web::Json<CreateUser>,
) -> ApiResult<HttpResponse> {
    let id = dispatch.send(payload.into_inner()).await?;
    Ok(HttpResponse::Created()
        .insert_header((LOCATION, format!("{}/{id}", dispatch.instance())))
        .json(CreatedUser { id }))
}

/// Fetch one user.
#[get("/users/{id}")]
pub async fn get_user(
    dispatch: Dispatch,
    path: web::Path<String>,
) -> ApiResult<web::Json<UserView>> {
    let id = path
        .parse::<UserId>()
        .map_err(|_| dispatch.reject(&Error::invalid_field("id", "User id must be a valid UUID")))?;
    let view = dispatch.send(GetUser { id }).await?;
    Ok(web::Json(view))
}

/// List users matching the query filter.
#[get("/users")]
pub async fn list_users(
    dispatch: Dispatch,
    query: web::Query<UserFilter>,
) -> ApiResult<web::Json<Page<UserView>>> {
    let page = dispatch
        .send(ListUsers {
            filter: query.into_inner(),
        })
        .await?;
    Ok(web::Json(page))
}
