//! Diesel table definitions for the users store.
//!
//! The schema is provisioned outside this crate; these definitions must match
//! it column for column.

diesel::table! {
    /// Registered users.
    ///
    /// `email` carries the unique constraint `users_email_key`.
    users (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Given name (max 100 characters).
        first_name -> Varchar,
        /// Family name (max 100 characters).
        last_name -> Varchar,
        /// Unique email address (max 255 characters).
        email -> Varchar,
        /// Optional phone number (max 20 characters).
        phone_number -> Nullable<Varchar>,
        is_active -> Bool,
        created_at -> Timestamptz,
        last_login_at -> Nullable<Timestamptz>,
    }
}
