use std::sync::Arc;
use std::time::Duration;

use area::components::register_builtins;
use area::queue::{JobQueue, MemoryQueue};
use area::registry::ComponentRegistry;
use area::store::MemoryStore;
use area::subsystems::supervisor::Supervisor;
use area_types::{Area, AreaId, ComponentName, Credential, Job};
use serde_json::json;

fn registry() -> Arc<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    register_builtins(&mut registry).unwrap();
    Arc::new(registry)
}

fn supervisor(store: &MemoryStore, queue: Arc<MemoryQueue>) -> Supervisor {
    Supervisor::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        registry(),
        queue,
        Duration::from_secs(10),
    )
}

fn name(s: &str) -> ComponentName {
    ComponentName::new(s).unwrap()
}

fn time_area(id: i64) -> Area {
    Area::new(id, 7, name("time_action"), name("print_reaction")).with_trigger(
        name("time_trigger"),
        json!({"interval": 60, "last_run": 0.0})
            .as_object()
            .unwrap()
            .clone(),
    )
}

async fn wait_for_job(queue: &MemoryQueue) -> Job {
    for _ in 0..60 {
        if let Some(payload) = queue.pop().await.unwrap() {
            return Job::decode(&payload).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no job showed up in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn new_area_is_scheduled_once() {
    area::init_tracing_tests();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new());
    let supervisor = supervisor(&store, queue);

    store.insert_area(time_area(1));

    supervisor.reconcile().await.unwrap();
    assert!(supervisor.active().contains(AreaId::new(1)));
    assert_eq!(supervisor.active().len(), 1);

    // a second cycle with the same area must not double-start it
    supervisor.reconcile().await.unwrap();
    assert_eq!(supervisor.active().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_area_is_cancelled_and_joined() {
    area::init_tracing_tests();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new());
    let supervisor = supervisor(&store, queue);

    store.insert_area(time_area(2));
    supervisor.reconcile().await.unwrap();
    assert_eq!(supervisor.active().len(), 1);

    store.remove_area(AreaId::new(2));
    supervisor.reconcile().await.unwrap();
    assert!(supervisor.active().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_interval_is_never_scheduled_but_retried() {
    area::init_tracing_tests();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new());
    let supervisor = supervisor(&store, queue);

    let broken = Area::new(3, 7, name("time_action"), name("print_reaction")).with_trigger(
        name("time_trigger"),
        json!({"interval": "fast"}).as_object().unwrap().clone(),
    );
    store.insert_area(broken);

    // the failure repeats on every cycle; the area never becomes active
    for _ in 0..3 {
        supervisor.reconcile().await.unwrap();
        assert!(supervisor.active().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_trigger_kind_is_skipped() {
    area::init_tracing_tests();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new());
    let supervisor = supervisor(&store, queue);

    let unknown = Area::new(4, 7, name("time_action"), name("print_reaction")).with_trigger(
        name("no_such_trigger"),
        serde_json::Map::new(),
    );
    store.insert_area(unknown);

    supervisor.reconcile().await.unwrap();
    assert!(supervisor.active().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn area_without_trigger_is_left_unscheduled() {
    area::init_tracing_tests();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new());
    let supervisor = supervisor(&store, queue);

    store.insert_area(Area::new(5, 7, name("time_action"), name("print_reaction")));

    supervisor.reconcile().await.unwrap();
    assert!(supervisor.active().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn action_and_reaction_tokens_resolve_per_service() {
    area::init_tracing_tests();

    let store = MemoryStore::new();
    let queue = Arc::new(MemoryQueue::new());

    // same user, two services, two different credentials
    store.set_credential(7.into(), "github", Credential::new("A-TOK".into()));
    store.set_credential(7.into(), "google", Credential::new("B-TOK".into()));

    let cross_service = Area::new(6, 7, name("new_push"), name("send_email"))
        .with_trigger(
            name("time_trigger"),
            json!({"interval": 1, "last_run": 0.0})
                .as_object()
                .unwrap()
                .clone(),
        )
        .with_reaction_config(
            json!({"to": "team@example.com", "subject": "s", "body": "b"})
                .as_object()
                .unwrap()
                .clone(),
        );
    store.insert_area(cross_service);

    let supervisor = supervisor(&store, queue.clone());
    supervisor.reconcile().await.unwrap();

    let job = wait_for_job(&queue).await;
    assert_eq!(job.action.name.as_ref(), "new_push");
    assert_eq!(job.action.token(), Some("A-TOK"));
    assert_eq!(job.reaction.name.as_ref(), "send_email");
    assert_eq!(job.reaction.token(), Some("B-TOK"));

    // cleanup so the evaluator doesn't outlive the test noisily
    store.remove_area(AreaId::new(6));
    supervisor.reconcile().await.unwrap();
}
