//! User entity and its value types.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a first or last name.
pub const NAME_MAX: usize = 100;
/// Maximum length of an email address.
pub const EMAIL_MAX: usize = 255;
/// Maximum length of a phone number.
pub const PHONE_MAX: usize = 20;

/// Stable user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Reasons an email address is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("Email is required")]
    Empty,
    #[error("Email cannot exceed {max} characters")]
    TooLong { max: usize },
    #[error("Email must have a valid format")]
    InvalidFormat,
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // One `@`, no whitespace, and a dot somewhere in the domain part.
        let pattern = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Syntactically valid email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and construct an [`Email`].
    ///
    /// # Examples
    /// ```
    /// use modulith::modules::users::{Email, EmailError};
    ///
    /// assert!(Email::parse("ada@example.com").is_ok());
    /// assert_eq!(Email::parse("  "), Err(EmailError::Empty));
    /// assert_eq!(Email::parse("ada.example.com"), Err(EmailError::InvalidFormat));
    /// ```
    pub fn parse(raw: impl Into<String>) -> Result<Self, EmailError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(EmailError::Empty);
        }
        if raw.chars().count() > EMAIL_MAX {
            return Err(EmailError::TooLong { max: EMAIL_MAX });
        }
        if !email_regex().is_match(&raw) {
            return Err(EmailError::InvalidFormat);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Profile fields supplied when a user registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: Option<String>,
}

/// Registered user.
///
/// ## Invariants
/// - `email` is unique across all users; storage enforces it.
/// - New users start active with no recorded login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    profile: UserProfile,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Register a new, active user.
    pub fn register(id: UserId, profile: UserProfile, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            profile,
            is_active: true,
            created_at,
            last_login_at: None,
        }
    }

    /// Rebuild a user from stored state.
    pub fn restore(
        id: UserId,
        profile: UserProfile,
        is_active: bool,
        created_at: DateTime<Utc>,
        last_login_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            profile,
            is_active,
            created_at,
            last_login_at,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn first_name(&self) -> &str {
        &self.profile.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.profile.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.profile.first_name, self.profile.last_name)
    }

    pub fn email(&self) -> &Email {
        &self.profile.email
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.profile.phone_number.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    /// Whether `term` occurs in the name or email, ignoring case.
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        [
            self.first_name(),
            self.last_name(),
            self.profile.email.as_str(),
        ]
        .into_iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Read model returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            first_name: user.first_name().to_owned(),
            last_name: user.last_name().to_owned(),
            full_name: user.full_name(),
            email: user.email().to_string(),
            phone_number: user.phone_number().map(str::to_owned),
            is_active: user.is_active(),
            created_at: user.created_at(),
            last_login_at: user.last_login_at(),
        }
    }
}
