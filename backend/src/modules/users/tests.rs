//! Users requests dispatched through the full pipeline.

use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::domain::{
    Dispatcher, Error, ErrorKind, ModuleOwnership, ModuleRegistry, Request, RequestContext,
    TraceId, UnitOfWorkResolver,
};
use crate::outbound::persistence::InMemoryUsersStore;
use crate::test_support::{fixture_clock, fixture_timestamp};

struct Harness {
    dispatcher: Dispatcher,
    resolver: Arc<UnitOfWorkResolver>,
    store: InMemoryUsersStore,
}

impl Harness {
    fn over(store: Arc<dyn UsersStore>) -> (Dispatcher, Arc<UnitOfWorkResolver>) {
        let registry = ModuleRegistry::builder()
            .register_owner(UsersUnitOfWorkFactory::new(store))
            .build()
            .expect("registry builds");
        let dispatcher = register(Dispatcher::builder(), fixture_clock()).build();
        (dispatcher, Arc::new(UnitOfWorkResolver::new(registry)))
    }

    async fn execute<R: Request>(&self, request: R) -> Result<R::Response, Error> {
        let ctx = RequestContext::new(TraceId::generate(), Arc::clone(&self.resolver));
        self.dispatcher.execute(request, &ctx).await
    }
}

#[fixture]
fn harness() -> Harness {
    let store = InMemoryUsersStore::new();
    let (dispatcher, resolver) = Harness::over(Arc::new(store.clone()));
    Harness {
        dispatcher,
        resolver,
        store,
    }
}

fn create_user(first_name: &str, email: &str) -> CreateUser {
    CreateUser {
        first_name: first_name.to_owned(),
        last_name: "Lovelace".to_owned(),
        email: email.to_owned(),
        phone_number: None,
    }
}

#[rstest]
fn users_requests_belong_to_the_users_module() {
    for module in [CreateUser::MODULE, GetUser::MODULE, ListUsers::MODULE] {
        assert!(module.starts_with(USERS_MODULE), "{module}");
    }
    assert_eq!(UsersUnitOfWorkFactory::PREFIXES, [USERS_MODULE]);
}

#[rstest]
#[tokio::test]
async fn created_user_can_be_fetched(harness: Harness) {
    let id = harness
        .execute(create_user("Ada", "ada@example.com"))
        .await
        .expect("user created");

    let view = harness.execute(GetUser { id }).await.expect("user found");

    assert_eq!(view.id, id);
    assert_eq!(view.full_name, "Ada Lovelace");
    assert_eq!(view.email, "ada@example.com");
    assert!(view.is_active);
    assert_eq!(view.created_at, fixture_timestamp());
    assert_eq!(view.last_login_at, None);
    assert_eq!(harness.store.len().await, 1);
}

#[rstest]
#[tokio::test]
async fn duplicate_email_is_a_conflict_and_adds_no_row(harness: Harness) {
    harness
        .execute(create_user("Ada", "ada@example.com"))
        .await
        .expect("first registration");

    let err = harness
        .execute(create_user("Augusta", "ada@example.com"))
        .await
        .expect_err("duplicate email rejected");

    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(err.kind().status(), 409);
    assert_eq!(err.extension("errorCode"), Some(&json!("BUSINESS_RULE_VIOLATION")));
    assert_eq!(err.extension("ruleName"), Some(&json!("unique_email")));
    assert_eq!(
        err.message(),
        "User with email 'ada@example.com' already exists."
    );
    assert_eq!(harness.store.len().await, 1);
}

#[rstest]
#[tokio::test]
async fn invalid_registration_never_reaches_storage(harness: Harness) {
    let request = CreateUser {
        first_name: "  ".to_owned(),
        last_name: "L".repeat(NAME_MAX + 1),
        email: "not-an-email".to_owned(),
        phone_number: Some("0".repeat(PHONE_MAX + 1)),
    };

    let err = harness.execute(request).await.expect_err("validation fails");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "Validation failed for CreateUser");
    let fields = err.field_errors().expect("field errors attached");
    assert_eq!(
        fields.fields().collect::<Vec<_>>(),
        ["firstName", "lastName", "email", "phoneNumber"]
    );
    assert_eq!(fields.get("firstName"), Some(&["First name is required".to_owned()][..]));
    assert_eq!(
        fields.get("email"),
        Some(&["Email must have a valid format".to_owned()][..])
    );
    assert!(harness.store.is_empty().await);
}

#[rstest]
#[tokio::test]
async fn unknown_user_is_not_found(harness: Harness) {
    let id: UserId = "6f1c7e0a-52b4-4a53-9a4f-0f3d7f1b2c3d".parse().expect("uuid");

    let err = harness.execute(GetUser { id }).await.expect_err("missing user");

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.message(),
        "User with ID '6f1c7e0a-52b4-4a53-9a4f-0f3d7f1b2c3d' was not found"
    );
    assert_eq!(err.extension("resourceType"), Some(&json!("User")));
}

#[rstest]
#[tokio::test]
async fn listing_filters_and_pages(harness: Harness) {
    for (name, email) in [
        ("Grace", "grace@navy.mil"),
        ("Ada", "ada@example.com"),
        ("Alan", "alan@example.com"),
    ] {
        harness
            .execute(create_user(name, email))
            .await
            .expect("user created");
    }

    let page = harness
        .execute(ListUsers {
            filter: UserFilter {
                search: Some("example".to_owned()),
                is_active: Some(true),
                page: 1,
                page_size: 1,
            },
        })
        .await
        .expect("listing succeeds");

    assert_eq!(page.total, 2);
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].first_name, "Ada");
}

#[rstest]
#[case(0, 10, "page")]
#[case(1, 0, "pageSize")]
#[case(1, MAX_PAGE_SIZE + 1, "pageSize")]
#[tokio::test]
async fn listing_rejects_out_of_range_paging(
    harness: Harness,
    #[case] page: u32,
    #[case] page_size: u32,
    #[case] field: &str,
) {
    let filter = UserFilter {
        page,
        page_size,
        ..UserFilter::default()
    };

    let err = harness
        .execute(ListUsers { filter })
        .await
        .expect_err("paging rejected");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.field_errors().and_then(|errors| errors.get(field)).is_some());
}

struct SingleSessionStore(Mutex<Option<MockUsersSession>>);

impl UsersStore for SingleSessionStore {
    fn open(&self) -> Box<dyn UsersSession> {
        let session = self
            .0
            .lock()
            .expect("store lock")
            .take()
            .expect("one session per test");
        Box::new(session)
    }
}

#[rstest]
#[tokio::test]
async fn storage_failure_rolls_back_without_commit() {
    let mut session = MockUsersSession::new();
    session.expect_in_transaction().return_const(false);
    session.expect_begin().times(1).returning(|| Ok(()));
    session
        .expect_find_by_email()
        .withf(|email| email.as_str() == "ada@example.com")
        .times(1)
        .returning(|_| Err(Error::infrastructure("postgres", "connection reset")));
    session.expect_add().times(0);
    session.expect_save_changes().times(0);
    session.expect_commit().times(0);
    session.expect_rollback().times(1).returning(|| Ok(()));

    let store = SingleSessionStore(Mutex::new(Some(session)));
    let (dispatcher, resolver) = Harness::over(Arc::new(store));
    let ctx = RequestContext::new(TraceId::generate(), resolver);

    let err = dispatcher
        .execute(create_user("Ada", "ada@example.com"), &ctx)
        .await
        .expect_err("storage failure surfaces");

    assert_eq!(err.kind(), ErrorKind::Infrastructure);
    assert_eq!(err.extension("serviceName"), Some(&json!("postgres")));
}
