//! In-memory users store for local runs and tests.
//!
//! Committed users live in a shared map. A session keeps its own staged and
//! saved users until `commit` publishes them; saved users are visible to reads
//! in the same session only. Outside a transaction `save_changes` publishes
//! immediately. Email uniqueness is enforced at publish time, mirroring the
//! unique constraint on the PostgreSQL table.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::Error;
use crate::modules::users::{Email, User, UserFilter, UserId, UserSlice, UsersSession, UsersStore};

use super::error_mapping::unique_violation;

const USERS_TABLE: &str = "users";
const EMAIL_CONSTRAINT: &str = "users_email_key";

type Committed = Arc<RwLock<HashMap<UserId, User>>>;

/// Shared in-memory user table.
#[derive(Clone, Default)]
pub struct InMemoryUsersStore {
    users: Committed,
}

impl InMemoryUsersStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl UsersStore for InMemoryUsersStore {
    fn open(&self) -> Box<dyn UsersSession> {
        Box::new(InMemoryUsersSession {
            committed: Arc::clone(&self.users),
            state: Mutex::new(SessionState::default()),
            open: AtomicBool::new(false),
        })
    }
}

#[derive(Default)]
struct SessionState {
    pending: Vec<User>,
    saved: Vec<User>,
}

/// Session over an [`InMemoryUsersStore`].
pub struct InMemoryUsersSession {
    committed: Committed,
    state: Mutex<SessionState>,
    open: AtomicBool,
}

fn publish(table: &mut HashMap<UserId, User>, batch: Vec<User>) -> Result<(), Error> {
    for (index, user) in batch.iter().enumerate() {
        let taken = table.values().any(|existing| existing.email() == user.email())
            || batch[..index].iter().any(|earlier| earlier.email() == user.email());
        if taken {
            return Err(unique_violation(USERS_TABLE, Some(EMAIL_CONSTRAINT)));
        }
    }
    table.extend(batch.into_iter().map(|user| (user.id(), user)));
    Ok(())
}

impl InMemoryUsersSession {
    async fn visible(&self) -> Vec<User> {
        let state = self.state.lock().await;
        let committed = self.committed.read().await;
        committed
            .values()
            .chain(state.saved.iter())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UsersSession for InMemoryUsersSession {
    async fn begin(&self) -> Result<(), Error> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn save_changes(&self) -> Result<u64, Error> {
        let mut state = self.state.lock().await;
        let pending = std::mem::take(&mut state.pending);
        let written = u64::try_from(pending.len()).unwrap_or(u64::MAX);
        if self.open.load(Ordering::SeqCst) {
            let committed = self.committed.read().await;
            let mut combined: HashMap<UserId, User> = committed.clone();
            drop(committed);
            for user in &state.saved {
                combined.insert(user.id(), user.clone());
            }
            publish(&mut combined, pending.clone())?;
            state.saved.extend(pending);
        } else {
            publish(&mut *self.committed.write().await, pending)?;
        }
        Ok(written)
    }

    async fn commit(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if !self.open.load(Ordering::SeqCst) {
            return Ok(());
        }
        let saved = std::mem::take(&mut state.saved);
        let result = publish(&mut *self.committed.write().await, saved);
        self.open.store(false, Ordering::SeqCst);
        result
    }

    async fn rollback(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        state.pending.clear();
        state.saved.clear();
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, Error> {
        Ok(self.visible().await.into_iter().find(|user| user.id() == id))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, Error> {
        Ok(self
            .visible()
            .await
            .into_iter()
            .find(|user| user.email() == email))
    }

    async fn list(&self, filter: &UserFilter) -> Result<UserSlice, Error> {
        let mut matches: Vec<User> = self
            .visible()
            .await
            .into_iter()
            .filter(|user| filter.search_term().is_none_or(|term| user.matches_search(term)))
            .filter(|user| filter.is_active.is_none_or(|active| user.is_active() == active))
            .collect();
        matches.sort_by(|a, b| {
            (a.first_name(), a.last_name(), a.id()).cmp(&(b.first_name(), b.last_name(), b.id()))
        });
        let total = u64::try_from(matches.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit()).unwrap_or(usize::MAX);
        let users = matches.into_iter().skip(offset).take(limit).collect();
        Ok(UserSlice { users, total })
    }

    async fn add(&self, user: User) -> Result<(), Error> {
        self.state.lock().await.pending.push(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorKind;
    use crate::modules::users::UserProfile;
    use crate::test_support::fixture_timestamp;
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn user(first_name: &str, email: &str) -> User {
        let profile = UserProfile {
            first_name: first_name.to_owned(),
            last_name: "Tester".to_owned(),
            email: Email::parse(email).expect("valid email"),
            phone_number: None,
        };
        User::register(UserId::random(), profile, fixture_timestamp())
    }

    #[fixture]
    fn store() -> InMemoryUsersStore {
        InMemoryUsersStore::new()
    }

    #[rstest]
    #[tokio::test]
    async fn saved_users_stay_private_until_commit(store: InMemoryUsersStore) {
        let writer = store.open();
        let reader = store.open();
        let ada = user("Ada", "ada@example.com");
        let id = ada.id();

        writer.begin().await.expect("begin");
        writer.add(ada).await.expect("add");
        assert_eq!(writer.save_changes().await.expect("save"), 1);

        assert!(writer.find_by_id(id).await.expect("read").is_some());
        assert!(reader.find_by_id(id).await.expect("read").is_none());

        writer.commit().await.expect("commit");
        assert!(reader.find_by_id(id).await.expect("read").is_some());
        assert_eq!(store.len().await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn rollback_discards_saved_users(store: InMemoryUsersStore) {
        let session = store.open();
        session.begin().await.expect("begin");
        session.add(user("Ada", "ada@example.com")).await.expect("add");
        session.save_changes().await.expect("save");
        session.rollback().await.expect("rollback");

        assert!(!session.in_transaction());
        assert!(store.is_empty().await);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_email_violates_unique_constraint(store: InMemoryUsersStore) {
        let first = store.open();
        first.add(user("Ada", "ada@example.com")).await.expect("add");
        first.save_changes().await.expect("autocommit save");

        let second = store.open();
        second.begin().await.expect("begin");
        second.add(user("Augusta", "ada@example.com")).await.expect("add");
        let err = second.save_changes().await.expect_err("duplicate email");

        assert_eq!(err.kind(), ErrorKind::BusinessRule);
        assert_eq!(err.extension("ruleName"), Some(&json!("unique_constraint")));
        assert_eq!(err.extension("constraint"), Some(&json!("users_email_key")));
        assert_eq!(store.len().await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn racing_commits_keep_emails_unique(store: InMemoryUsersStore) {
        let left = store.open();
        let right = store.open();
        for (session, name) in [(&left, "Left"), (&right, "Right")] {
            session.begin().await.expect("begin");
            session.add(user(name, "shared@example.com")).await.expect("add");
            session.save_changes().await.expect("save");
        }

        left.commit().await.expect("first commit wins");
        let err = right.commit().await.expect_err("second commit conflicts");
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
        assert!(!right.in_transaction());
        assert_eq!(store.len().await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn list_filters_sorts_and_pages(store: InMemoryUsersStore) {
        let session = store.open();
        for (name, email) in [
            ("Grace", "grace@navy.mil"),
            ("Ada", "ada@example.com"),
            ("Alan", "alan@example.com"),
            ("Edsger", "edsger@example.nl"),
        ] {
            session.add(user(name, email)).await.expect("add");
        }
        session.save_changes().await.expect("save");

        let filter = UserFilter {
            search: Some("EXAMPLE".to_owned()),
            page: 1,
            page_size: 2,
            ..UserFilter::default()
        };
        let slice = session.list(&filter).await.expect("list");
        let names: Vec<_> = slice.users.iter().map(User::first_name).collect();

        assert_eq!(slice.total, 3);
        assert_eq!(names, ["Ada", "Alan"]);

        let second = UserFilter { page: 2, ..filter };
        let slice = session.list(&second).await.expect("list");
        let names: Vec<_> = slice.users.iter().map(User::first_name).collect();
        assert_eq!(names, ["Edsger"]);
    }
}
