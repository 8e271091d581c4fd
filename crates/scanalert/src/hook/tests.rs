use super::*;
use crate::client::GenericClient;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult, ScanError, ScanResult};
use crate::options::QueryKind;
use std::sync::{Arc, Mutex, Weak};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

// ── Shared fakes ──

#[derive(Default)]
struct FakeClient {
    fail: bool,
}

impl GenericClient for FakeClient {
    async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> OrmResult<Vec<Row>> {
        if self.fail {
            return Err(OrmError::Other("relation does not exist".to_string()));
        }
        Ok(vec![])
    }
    async fn execute(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> OrmResult<u64> {
        if self.fail {
            return Err(OrmError::Other("relation does not exist".to_string()));
        }
        Ok(1)
    }
}

#[async_trait::async_trait]
impl ExplainExecutor for FakeClient {
    async fn explain(&self, _: &str) -> ScanResult<Vec<ScanResult<String>>> {
        Ok(vec![])
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<StatementSnapshot>>);

impl Recorder {
    fn seen(&self) -> Vec<StatementSnapshot> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StatementHook for Recorder {
    async fn on_statement(&self, event: StatementEvent) {
        self.0.lock().unwrap().push(event.statement().clone());
    }
}

// ── HookRegistry ──

#[test]
fn registry_rejects_duplicate_keys_per_kind() {
    let registry = HookRegistry::new();
    let hook = Arc::new(Recorder::default());

    registry
        .register(QueryKind::Select, "alerts_query", hook.clone())
        .unwrap();
    registry
        .register(QueryKind::Update, "alerts_query", hook.clone())
        .unwrap();

    let err = registry
        .register(QueryKind::Select, "alerts_query", hook)
        .unwrap_err();
    assert!(err.is_registration());
    assert_eq!(registry.keys(QueryKind::Select), vec!["alerts_query"]);
}

#[test]
fn registry_batches_are_all_or_nothing() {
    let registry = HookRegistry::new();
    let hook: Arc<dyn StatementHook> = Arc::new(Recorder::default());
    registry
        .register(QueryKind::Delete, "a_delete", hook.clone())
        .unwrap();

    let err = registry
        .register_all(vec![
            Subscription::new(QueryKind::Select, "a_query", hook.clone()),
            Subscription::new(QueryKind::Delete, "a_delete", hook.clone()),
        ])
        .unwrap_err();
    assert!(matches!(err, ScanError::Registration { ref key, .. } if key == "a_delete"));
    assert!(!registry.is_watched(QueryKind::Select));

    let err = registry
        .register_all(vec![
            Subscription::new(QueryKind::Raw, "b_raw", hook.clone()),
            Subscription::new(QueryKind::Raw, "b_raw", hook.clone()),
        ])
        .unwrap_err();
    assert!(err.is_registration());
    assert!(!registry.is_watched(QueryKind::Raw));

    assert!(registry.register(QueryKind::Raw, "", hook).is_err());
}

#[test]
fn registry_unregister() {
    let registry = HookRegistry::new();
    registry
        .register(QueryKind::Create, "a_create", Arc::new(Recorder::default()))
        .unwrap();

    assert!(registry.is_watched(QueryKind::Create));
    assert!(registry.unregister(QueryKind::Create, "a_create"));
    assert!(!registry.unregister(QueryKind::Create, "a_create"));
    assert!(!registry.is_watched(QueryKind::Create));
}

#[tokio::test]
async fn dispatch_runs_hooks_in_registration_order() {
    struct Named(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait::async_trait]
    impl StatementHook for Named {
        async fn on_statement(&self, _: StatementEvent) {
            self.1.lock().unwrap().push(self.0);
        }
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let registry = HookRegistry::new();
    registry
        .register(QueryKind::Select, "first", Arc::new(Named("first", order.clone())))
        .unwrap();
    registry
        .register(QueryKind::Select, "second", Arc::new(Named("second", order.clone())))
        .unwrap();

    let session: Weak<dyn ExplainExecutor> = Weak::<FakeClient>::new();
    let snapshot = StatementSnapshot::new(QueryKind::Select, "SELECT 1", Dialect::Postgres);
    registry.dispatch(StatementEvent::new(snapshot, session)).await;

    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

// ── StatementEvent ──

#[test]
fn event_reports_closed_session() {
    let client = Arc::new(FakeClient::default());
    let session: Weak<dyn ExplainExecutor> = Arc::<FakeClient>::downgrade(&client);
    let event = StatementEvent::new(
        StatementSnapshot::new(QueryKind::Select, "SELECT 1", Dialect::Postgres),
        session,
    );
    assert!(event.executor().is_ok());

    drop(client);
    assert!(matches!(
        event.executor(),
        Err(ScanError::ConnectionAccess(_))
    ));
}

#[test]
fn snapshot_inlines_parameters() {
    let snapshot = StatementSnapshot::capture(
        QueryKind::Select,
        "SELECT * FROM fruits WHERE name != $1 AND id < $2",
        &[&"apple", &10_i64],
        Dialect::Postgres,
    );
    assert_eq!(snapshot.params, vec!["'apple'", "10"]);
    assert_eq!(
        snapshot.explained_sql(),
        "SELECT * FROM fruits WHERE name != 'apple' AND id < 10"
    );
}

#[tokio::test]
async fn explain_failure_maps_to_explain_execution() {
    let rows = crate::client::explain_rows(&FakeClient::default(), "EXPLAIN SELECT 1")
        .await
        .unwrap();
    assert!(rows.is_empty());

    let err = crate::client::explain_rows(&FakeClient { fail: true }, "EXPLAIN SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::ExplainExecution(ref m) if m.contains("relation does not exist")));
}

// ── ObservedClient ──

#[tokio::test]
async fn structured_path_fires_detected_kind() {
    let client = ObservedClient::new(FakeClient::default());
    let recorder = Arc::new(Recorder::default());
    for kind in QueryKind::ALL {
        client
            .subscribe(kind, &format!("rec_{kind}"), recorder.clone())
            .unwrap();
    }

    client
        .query("SELECT * FROM fruits WHERE id = $1", &[&1_i32])
        .await
        .unwrap();
    client
        .execute("INSERT INTO fruits (name) VALUES ($1)", &[&"kiwi"])
        .await
        .unwrap();
    client
        .execute("UPDATE fruits SET name = 'x' WHERE id = 1", &[])
        .await
        .unwrap();
    client
        .query_opt("DELETE FROM fruits WHERE id = 1 RETURNING id", &[])
        .await
        .unwrap();
    client.execute("VACUUM fruits", &[]).await.unwrap();

    let kinds: Vec<QueryKind> = recorder.seen().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            QueryKind::Select,
            QueryKind::Create,
            QueryKind::Update,
            QueryKind::Delete,
            QueryKind::Raw,
        ]
    );
    assert_eq!(recorder.seen()[0].params, vec!["1"]);
    assert_eq!(recorder.seen()[0].dialect, Dialect::Postgres);
}

#[tokio::test]
async fn raw_path_always_fires_raw() {
    let client = ObservedClient::new(FakeClient::default());
    let raw = Arc::new(Recorder::default());
    let update = Arc::new(Recorder::default());
    client.subscribe(QueryKind::Raw, "raw", raw.clone()).unwrap();
    client
        .subscribe(QueryKind::Update, "update", update.clone())
        .unwrap();

    client
        .exec("UPDATE fruits SET created_at = NOW() WHERE name != 'apple'", &[])
        .await
        .unwrap();
    client.raw("SELECT 1", &[]).await.unwrap();

    assert_eq!(raw.seen().len(), 2);
    assert!(update.seen().is_empty());
}

#[tokio::test]
async fn unwatched_kinds_and_failed_statements_do_not_fire() {
    let client = ObservedClient::new(FakeClient::default());
    let recorder = Arc::new(Recorder::default());
    client
        .subscribe(QueryKind::Select, "sel", recorder.clone())
        .unwrap();

    client.execute("DELETE FROM fruits", &[]).await.unwrap();
    assert!(recorder.seen().is_empty());

    let failing = ObservedClient::new(FakeClient { fail: true });
    failing
        .subscribe(QueryKind::Select, "sel", recorder.clone())
        .unwrap();
    assert!(failing.query("SELECT * FROM missing", &[]).await.is_err());
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn query_one_without_rows_is_not_found_and_does_not_fire() {
    let client = ObservedClient::new(FakeClient::default());
    let recorder = Arc::new(Recorder::default());
    client
        .subscribe(QueryKind::Select, "sel", recorder.clone())
        .unwrap();

    let err = client.query_one("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(recorder.seen().is_empty());
}

#[test]
fn dialect_override() {
    let client = ObservedClient::new(FakeClient::default()).with_dialect(Dialect::Mysql);
    assert_eq!(client.dialect(), Dialect::Mysql);
}
