//! Behavioural tests for stage ordering, transactions and cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::domain::classification::ErrorInfo;
use crate::domain::error::ErrorKind;
use crate::domain::request::RequestKind;
use crate::domain::trace_id::TraceId;
use crate::domain::unit_of_work::{ModuleRegistry, UnitOfWorkResolver};
use crate::domain::validation::{MockValidator, ValidationFailure};
use crate::test_support::{Call, Failures, RecordingFactory, capture_logs};
use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

const WIDGETS: &str = "app::widgets";

#[derive(Debug, Clone)]
struct CreateWidget {
    name: String,
}

impl Request for CreateWidget {
    type Response = u32;
    const KIND: RequestKind = RequestKind::Command;
    const MODULE: &'static str = "app::widgets::commands";
    const NAME: &'static str = "CreateWidget";
}

#[derive(Debug, Clone)]
struct CountWidgets;

impl Request for CountWidgets {
    type Response = u32;
    const KIND: RequestKind = RequestKind::Query;
    const MODULE: &'static str = "app::widgets::queries";
    const NAME: &'static str = "CountWidgets";
}

#[derive(Debug, Clone)]
struct ArchiveWidgets;

impl Request for ArchiveWidgets {
    type Response = u32;
    const KIND: RequestKind = RequestKind::Command;
    const MODULE: &'static str = "app::orphans::commands";
    const NAME: &'static str = "ArchiveWidgets";
}

/// Handler with a scripted outcome that counts invocations.
#[derive(Clone, Default)]
struct Scripted {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl Scripted {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<u32, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::business_rule("widget_limit", "Too many widgets."))
        } else {
            Ok(7)
        }
    }
}

#[async_trait]
impl Handler<CreateWidget> for Scripted {
    async fn handle(&self, _request: CreateWidget, _ctx: &RequestContext) -> Result<u32, Error> {
        self.outcome()
    }
}

#[async_trait]
impl Handler<CountWidgets> for Scripted {
    async fn handle(&self, _request: CountWidgets, _ctx: &RequestContext) -> Result<u32, Error> {
        self.outcome()
    }
}

#[async_trait]
impl Handler<ArchiveWidgets> for Scripted {
    async fn handle(&self, _request: ArchiveWidgets, _ctx: &RequestContext) -> Result<u32, Error> {
        self.outcome()
    }
}

/// Cancels its own request and then never finishes.
struct CancelsMidway;

#[async_trait]
impl Handler<CreateWidget> for CancelsMidway {
    async fn handle(&self, _request: CreateWidget, ctx: &RequestContext) -> Result<u32, Error> {
        ctx.cancellation().cancel();
        std::future::pending::<()>().await;
        Ok(0)
    }
}

struct NameRequired;

#[async_trait]
impl Validator<CreateWidget> for NameRequired {
    async fn validate(
        &self,
        request: &CreateWidget,
        _cancel: &CancellationToken,
    ) -> Vec<ValidationFailure> {
        if request.name.trim().is_empty() {
            vec![ValidationFailure::new("name", "Name is required")]
        } else {
            Vec::new()
        }
    }
}

struct NameShort;

#[async_trait]
impl Validator<CreateWidget> for NameShort {
    async fn validate(
        &self,
        request: &CreateWidget,
        _cancel: &CancellationToken,
    ) -> Vec<ValidationFailure> {
        if request.name.len() > 3 {
            return vec![ValidationFailure::new("name", "Name is too long")];
        }
        if request.name.is_empty() {
            return vec![
                ValidationFailure::new("name", "Name must not be blank"),
                ValidationFailure::new("sku", "Sku is required"),
            ];
        }
        Vec::new()
    }
}

struct Harness {
    factory: RecordingFactory,
    resolver: Arc<UnitOfWorkResolver>,
}

impl Harness {
    fn with(factory: RecordingFactory) -> Self {
        let registry = ModuleRegistry::builder()
            .register(WIDGETS, "widgets", factory.clone())
            .build()
            .expect("registry builds");
        Self {
            factory,
            resolver: Arc::new(UnitOfWorkResolver::new(registry)),
        }
    }

    fn context(&self) -> RequestContext {
        RequestContext::new(TraceId::generate(), Arc::clone(&self.resolver))
    }

    fn calls(&self) -> Vec<Call> {
        self.factory.journal().calls()
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::with(RecordingFactory::new())
}

fn widget(name: &str) -> CreateWidget {
    CreateWidget {
        name: name.to_owned(),
    }
}

#[rstest]
#[tokio::test]
async fn successful_command_saves_then_commits_once(harness: Harness) {
    let handler = Scripted::default();
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(handler.clone())
        .validator::<CreateWidget, _>(NameRequired)
        .build();

    let result = dispatcher.execute(widget("ok"), &harness.context()).await;

    assert_eq!(result.expect("command succeeds"), 7);
    assert_eq!(handler.calls(), 1);
    assert_eq!(harness.calls(), vec![Call::Begin, Call::Save, Call::Commit]);
}

#[rstest]
#[tokio::test]
async fn failing_handler_rolls_back_exactly_once(harness: Harness) {
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(Scripted::failing())
        .build();

    let err = dispatcher
        .execute(widget("ok"), &harness.context())
        .await
        .expect_err("handler fails");

    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(harness.calls(), vec![Call::Begin, Call::Rollback]);
}

#[rstest]
#[tokio::test]
async fn queries_never_touch_the_unit_of_work(harness: Harness) {
    let dispatcher = Dispatcher::builder()
        .handler::<CountWidgets, _>(Scripted::default())
        .build();

    let result = dispatcher.execute(CountWidgets, &harness.context()).await;

    assert_eq!(result.expect("query succeeds"), 7);
    assert!(harness.calls().is_empty());
    assert_eq!(harness.factory.created(), 0);
}

#[rstest]
#[tokio::test]
async fn invalid_requests_never_reach_the_handler(harness: Harness) {
    let handler = Scripted::default();
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(handler.clone())
        .validator::<CreateWidget, _>(NameRequired)
        .validator::<CreateWidget, _>(NameShort)
        .build();

    let err = dispatcher
        .execute(widget(""), &harness.context())
        .await
        .expect_err("validation fails");

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "Validation failed for CreateWidget");
    let errors = err.field_errors().expect("field errors");
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "sku"]);
    assert_eq!(errors.get("name").map(<[String]>::len), Some(2));
    assert_eq!(handler.calls(), 0);
    assert!(harness.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn validators_receive_the_request(harness: Harness) {
    let mut validator = MockValidator::<CreateWidget>::new();
    validator
        .expect_validate()
        .withf(|request, _| request.name == "probe")
        .times(1)
        .returning(|_, _| Vec::new());
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(Scripted::default())
        .validator::<CreateWidget, _>(validator)
        .build();

    let result = dispatcher.execute(widget("probe"), &harness.context()).await;
    assert!(result.is_ok());
}

#[rstest]
#[case(Failures { save: true, ..Failures::default() }, vec![Call::Begin, Call::Save, Call::Rollback])]
#[case(Failures { commit: true, ..Failures::default() }, vec![Call::Begin, Call::Save, Call::Commit, Call::Rollback])]
#[tokio::test]
async fn save_or_commit_failures_roll_back(#[case] failures: Failures, #[case] expected: Vec<Call>) {
    let harness = Harness::with(RecordingFactory::failing(failures));
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(Scripted::default())
        .build();

    let err = dispatcher
        .execute(widget("ok"), &harness.context())
        .await
        .expect_err("completion fails");

    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(harness.calls(), expected);
}

#[rstest]
#[tokio::test]
async fn rollback_failure_does_not_mask_original_error() {
    let harness = Harness::with(RecordingFactory::failing(Failures {
        rollback: true,
        ..Failures::default()
    }));
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(Scripted::failing())
        .build();

    let err = dispatcher
        .execute(widget("ok"), &harness.context())
        .await
        .expect_err("handler fails");

    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(harness.factory.journal().count(Call::Rollback), 1);
}

#[rstest]
#[tokio::test]
async fn cancellation_mid_transaction_rolls_back(harness: Harness) {
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(CancelsMidway)
        .build();

    let err = dispatcher
        .execute(widget("ok"), &harness.context())
        .await
        .expect_err("request cancelled");

    assert_eq!(ErrorInfo::classify(&err).error_code(), "REQUEST_CANCELLED");
    assert_eq!(harness.calls(), vec![Call::Begin, Call::Rollback]);
}

#[rstest]
#[tokio::test]
async fn cancelled_requests_short_circuit_before_validation(harness: Harness) {
    let handler = Scripted::default();
    let dispatcher = Dispatcher::builder()
        .handler::<CreateWidget, _>(handler.clone())
        .build();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = harness.context().with_cancellation(token);

    let err = dispatcher
        .execute(widget("ok"), &ctx)
        .await
        .expect_err("cancelled");

    assert_eq!(ErrorInfo::classify(&err).status(), 408);
    assert_eq!(handler.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn nested_commands_join_the_outer_transaction(harness: Harness) {
    let ctx = harness.context();
    let inner_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&inner_calls);
    let inner_ctx = ctx.clone();

    let outer: Next<'_, CreateWidget> = Box::new(move |request| {
        Box::pin(async move {
            let inner: Next<'_, CreateWidget> = Box::new(move |_| {
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
            });
            transaction_stage::run(request, &inner_ctx, inner).await
        })
    });
    let result = transaction_stage::run(widget("outer"), &ctx, outer).await;

    assert_eq!(result.expect("nested command succeeds"), 1);
    assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.calls(), vec![Call::Begin, Call::Save, Call::Commit]);
    assert_eq!(harness.factory.created(), 1);
}

#[rstest]
#[tokio::test]
async fn concurrent_requests_use_isolated_units(harness: Harness) {
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .handler::<CreateWidget, _>(Scripted::default())
            .build(),
    );

    let mut tasks = Vec::new();
    for index in 0..8 {
        let dispatcher = Arc::clone(&dispatcher);
        let ctx = harness.context();
        tasks.push(tokio::spawn(async move {
            dispatcher.execute(widget(&index.to_string()), &ctx).await
        }));
    }
    for task in tasks {
        task.await.expect("task joins").expect("command succeeds");
    }

    assert_eq!(harness.factory.created(), 8);
    assert_eq!(harness.factory.journal().count(Call::Commit), 8);
    assert_eq!(harness.factory.journal().count(Call::Rollback), 0);
}

#[rstest]
#[tokio::test]
async fn missing_handler_is_an_internal_error(harness: Harness) {
    let dispatcher = Dispatcher::builder().build();
    assert!(!dispatcher.handles::<CreateWidget>());
    let (logs, _guard) = capture_logs();

    let err = dispatcher
        .execute(widget("ok"), &harness.context())
        .await
        .expect_err("no handler");

    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert_eq!(ErrorInfo::classify(&err).status(), 500);
    let logged = logs.with_message("no handler registered");
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0]["level"], "ERROR");
    assert_eq!(logged[0]["fields"]["request"], "CreateWidget");
    assert_eq!(harness.factory.created(), 0);
}

#[rstest]
#[tokio::test]
async fn unregistered_modules_fail_with_configuration_error(harness: Harness) {
    let dispatcher = Dispatcher::builder()
        .handler::<ArchiveWidgets, _>(Scripted::default())
        .build();

    let err = dispatcher
        .execute(ArchiveWidgets, &harness.context())
        .await
        .expect_err("unregistered module");

    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert!(err.message().contains("app::orphans::commands"));
    assert!(err.message().contains("widgets (app::widgets)"));
}
