//! Internal Diesel row structs for the users table.
//!
//! Row types never leave the persistence layer; adapters convert them to and
//! from domain users.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::Error;
use crate::modules::users::{Email, User, UserId, UserProfile};

use super::schema::users;

/// Row read from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(row.email).map_err(|err| {
            Error::domain("User", format!("stored user {} has an invalid email: {err}", row.id))
        })?;
        let profile = UserProfile {
            first_name: row.first_name,
            last_name: row.last_name,
            email,
            phone_number: row.phone_number,
        };
        Ok(User::restore(
            UserId::from_uuid(row.id),
            profile,
            row.is_active,
            row.created_at,
            row.last_login_at,
        ))
    }
}

/// Insertable struct for new user records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone_number: Option<&'a str>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a User> for NewUserRow<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: *user.id().as_uuid(),
            first_name: user.first_name(),
            last_name: user.last_name(),
            email: user.email().as_str(),
            phone_number: user.phone_number(),
            is_active: user.is_active(),
            created_at: user.created_at(),
            last_login_at: user.last_login_at(),
        }
    }
}
