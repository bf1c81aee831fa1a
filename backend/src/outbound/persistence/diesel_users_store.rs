//! PostgreSQL-backed users store.
//!
//! Each session holds one pooled connection for its lifetime. `begin`,
//! `commit` and `rollback` drive Diesel's ANSI transaction manager on that
//! connection; reads issued inside a transaction see its uncommitted writes.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use diesel::PgTextExpressionMethods;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::Error;
use crate::modules::users::{Email, User, UserFilter, UserId, UserSlice, UsersSession, UsersStore};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewUserRow, UserRow};
use super::pool::DbPool;
use super::schema::users;

const USERS_TABLE: &str = "users";

/// Opens [`DieselUsersSession`]s over a shared pool.
#[derive(Clone)]
pub struct DieselUsersStore {
    pool: DbPool,
}

impl DieselUsersStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UsersStore for DieselUsersStore {
    fn open(&self) -> Box<dyn UsersSession> {
        Box::new(DieselUsersSession::new(self.pool.clone()))
    }
}

#[derive(Default)]
struct SessionState {
    connection: Option<PooledConnection<'static, AsyncPgConnection>>,
    pending: Vec<User>,
}

/// Users session bound to one pooled connection.
pub struct DieselUsersSession {
    pool: DbPool,
    state: Mutex<SessionState>,
    open: AtomicBool,
}

impl DieselUsersSession {
    fn new(pool: DbPool) -> Self {
        Self {
            pool,
            state: Mutex::new(SessionState::default()),
            open: AtomicBool::new(false),
        }
    }

    async fn connection<'a>(
        &self,
        state: &'a mut SessionState,
    ) -> Result<&'a mut AsyncPgConnection, Error> {
        let connection = match state.connection.take() {
            Some(connection) => connection,
            None => self.pool.get_owned().await.map_err(map_pool_error)?,
        };
        Ok(&mut **state.connection.insert(connection))
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn filtered(filter: &UserFilter) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();
    if let Some(term) = filter.search_term() {
        let pattern = format!("%{}%", escape_like(term));
        query = query.filter(
            users::first_name
                .ilike(pattern.clone())
                .or(users::last_name.ilike(pattern.clone()))
                .or(users::email.ilike(pattern)),
        );
    }
    if let Some(active) = filter.is_active {
        query = query.filter(users::is_active.eq(active));
    }
    query
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl UsersSession for DieselUsersSession {
    async fn begin(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if AtomicBool::load(&self.open, Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.connection(&mut state).await?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::begin_transaction(conn)
            .await
            .map_err(|err| map_diesel_error("begin", USERS_TABLE, err))?;
        self.open.store(true, Ordering::SeqCst);
        debug!("users transaction opened");
        Ok(())
    }

    async fn save_changes(&self) -> Result<u64, Error> {
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Ok(0);
        }
        let pending = std::mem::take(&mut state.pending);
        let rows: Vec<NewUserRow<'_>> = pending.iter().map(NewUserRow::from).collect();
        let conn = self.connection(&mut state).await?;
        let written = diesel::insert_into(users::table)
            .values(&rows)
            .execute(conn)
            .await
            .map_err(|err| map_diesel_error("insert", USERS_TABLE, err))?;
        Ok(u64::try_from(written).unwrap_or(u64::MAX))
    }

    async fn commit(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if !AtomicBool::load(&self.open, Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.connection(&mut state).await?;
        let result =
            <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::commit_transaction(
                conn,
            )
            .await
            .map_err(|err| map_diesel_error("commit", USERS_TABLE, err));
        // Postgres ends the transaction on a failed COMMIT as well.
        self.open.store(false, Ordering::SeqCst);
        result
    }

    async fn rollback(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.pending.clear();
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.connection(&mut state).await?;
        <AnsiTransactionManager as TransactionManager<AsyncPgConnection>>::rollback_transaction(
            conn,
        )
        .await
        .map_err(|err| map_diesel_error("rollback", USERS_TABLE, err))
    }

    fn in_transaction(&self) -> bool {
        AtomicBool::load(&self.open, Ordering::SeqCst)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Error> {
        let mut state = self.state.lock().await;
        let conn = self.connection(&mut state).await?;
        let row = users::table
            .find(*id.as_uuid())
            .select(UserRow::as_select())
            .first::<UserRow>(conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error("find_by_id", USERS_TABLE, err))?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, Error> {
        let mut state = self.state.lock().await;
        let conn = self.connection(&mut state).await?;
        let row = users::table
            .filter(users::email.eq(email.as_str()))
            .select(UserRow::as_select())
            .first::<UserRow>(conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error("find_by_email", USERS_TABLE, err))?;
        row.map(User::try_from).transpose()
    }

    async fn list(&self, filter: &UserFilter) -> Result<UserSlice, Error> {
        let mut state = self.state.lock().await;
        let conn = self.connection(&mut state).await?;
        let total = filtered(filter)
            .count()
            .get_result::<i64>(conn)
            .await
            .map_err(|err| map_diesel_error("count", USERS_TABLE, err))?;
        let rows = filtered(filter)
            .select(UserRow::as_select())
            .order((
                users::first_name.asc(),
                users::last_name.asc(),
                users::id.asc(),
            ))
            .limit(saturating_i64(filter.limit()))
            .offset(saturating_i64(filter.offset()))
            .load::<UserRow>(conn)
            .await
            .map_err(|err| map_diesel_error("list", USERS_TABLE, err))?;
        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UserSlice {
            users,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn add(&self, user: User) -> Result<(), Error> {
        self.state.lock().await.pending.push(user);
        Ok(())
    }
}
