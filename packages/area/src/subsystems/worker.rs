pub mod error;

use std::sync::Arc;
use std::time::Duration;

use area_types::Job;
use serde_json::Value;
use tracing::instrument;
use utils::context::AppContext;

use crate::queue::JobQueue;
use crate::registry::ComponentRegistry;
use crate::schema::{validate, ComponentKind};
use error::WorkerError;

/// Sleep between polls when the queue comes back empty
const EMPTY_POLL_DELAY: Duration = Duration::from_secs(1);

/// One queue drainer. Several can run concurrently against the same queue;
/// note that doing so gives up per-area processing order.
///
/// Failures of any kind are logged and the job is dropped - there is no
/// retry and no dead-letter path, by design.
pub struct Worker {
    id: usize,
    queue: Arc<dyn JobQueue>,
    registry: Arc<ComponentRegistry>,
}

impl Worker {
    pub fn new(id: usize, queue: Arc<dyn JobQueue>, registry: Arc<ComponentRegistry>) -> Self {
        Self {
            id,
            queue,
            registry,
        }
    }

    #[instrument(skip(self, ctx), fields(subsys = "Worker", worker = self.id))]
    pub async fn run(self, ctx: AppContext) {
        let mut kill = ctx.get_kill_receiver();
        tracing::info!("Worker listening for jobs");

        loop {
            let popped = tokio::select! {
                _ = kill.recv() => break,
                popped = self.queue.pop() => popped,
            };

            match popped {
                Ok(Some(payload)) => {
                    if let Err(err) = self.process(&payload).await {
                        tracing::error!("Error processing job: {err}");
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = kill.recv() => break,
                        _ = tokio::time::sleep(EMPTY_POLL_DELAY) => {}
                    }
                }
                Err(err) => {
                    tracing::error!("Error popping from queue: {err}");
                    tokio::select! {
                        _ = kill.recv() => break,
                        _ = tokio::time::sleep(EMPTY_POLL_DELAY) => {}
                    }
                }
            }
        }

        tracing::info!("Worker stopped");
    }

    /// Run one job to completion: action first, then - unless the action's
    /// filter rejected the event - the reaction, fed with the action's
    /// response.
    pub async fn process(&self, payload: &[u8]) -> Result<(), WorkerError> {
        let job = Job::decode(payload).map_err(WorkerError::MalformedJob)?;

        // resolve both components before running either, so a job with a
        // dangling reaction name doesn't half-execute
        let action_entry = self.registry.action(&job.action.name)?;
        let reaction_entry = self.registry.reaction(&job.reaction.name)?;

        // the action sees its event-derived params overlaid with the
        // enqueued config map - that is how the injected token (and option
        // settings like filters) reach it
        let mut action_options = job.action.params.clone();
        for (key, value) in &job.action.config {
            action_options.insert(key.clone(), value.clone());
        }
        let action_config = validate(ComponentKind::Action, &action_entry.schema, &action_options)
            .map_err(WorkerError::InvalidActionConfig)?;

        let action = (action_entry.ctor)(action_config).map_err(WorkerError::Action)?;
        let response = action.execute().await.map_err(WorkerError::Action)?;

        let Some(response) = response else {
            // filter rejected the event: silent no-op, the reaction never runs
            tracing::debug!(
                action = %job.action.name,
                "Action filtered out the event, skipping reaction"
            );
            return Ok(());
        };

        let mut reaction_options = job.reaction.params.clone();
        reaction_options.insert(
            "token".to_string(),
            job.reaction
                .config
                .get("token")
                .cloned()
                .unwrap_or(Value::Null),
        );
        let reaction_config = validate(
            ComponentKind::Reaction,
            &reaction_entry.schema,
            &reaction_options,
        )
        .map_err(WorkerError::InvalidReactionConfig)?;

        let reaction = (reaction_entry.ctor)(reaction_config).map_err(WorkerError::Reaction)?;
        let result = reaction
            .execute(&response)
            .await
            .map_err(WorkerError::Reaction)?;

        tracing::info!(
            action = %job.action.name,
            reaction = %job.reaction.name,
            success = result.success,
            "Job finished"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::register_builtins;
    use crate::queue::MemoryQueue;
    use area_types::{ComponentName, Credential, JobStep, JobTrigger};
    use serde_json::json;

    fn test_worker() -> (Worker, Arc<MemoryQueue>) {
        let mut registry = ComponentRegistry::new();
        register_builtins(&mut registry).unwrap();
        let queue = Arc::new(MemoryQueue::new());
        (
            Worker::new(0, queue.clone(), Arc::new(registry)),
            queue,
        )
    }

    fn job(action: &str, reaction: &str) -> Job {
        Job {
            trigger: JobTrigger {
                name: ComponentName::new("time_trigger").unwrap(),
            },
            action: JobStep::new(ComponentName::new(action).unwrap()),
            reaction: JobStep::new(ComponentName::new(reaction).unwrap()),
            event_data: json!({"triggered_at": 1.0}),
        }
    }

    #[tokio::test]
    async fn happy_path_runs_action_and_reaction() {
        let (worker, _) = test_worker();
        let job = job("time_action", "print_reaction");
        worker.process(&job.encode().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_payload_is_reported() {
        let (worker, _) = test_worker();
        let err = worker.process(b"{not json").await.unwrap_err();
        assert!(matches!(err, WorkerError::MalformedJob(_)));
    }

    #[tokio::test]
    async fn unknown_action_is_skipped_without_running_reaction() {
        let (worker, _) = test_worker();
        let job = job("does_not_exist", "print_reaction");
        let err = worker.process(&job.encode().unwrap()).await.unwrap_err();
        assert!(matches!(err, WorkerError::UnknownComponent(_)));
    }

    #[tokio::test]
    async fn enqueued_token_reaches_the_action_config() {
        let (worker, _) = test_worker();

        let mut job = job("gmail_receive", "print_reaction");
        job.action.params = json!({
            "message_id": "m1",
            "sender": "alice@example.com",
            "subject": "hello",
            "snippet": "hi there",
            "received_at": "1700000000",
        })
        .as_object()
        .unwrap()
        .clone();
        job.action = job.action.with_token(Some(&Credential::new("A-TOK".into())));

        // gmail_receive succeeds without filters; reaching the reaction
        // proves validation accepted the merged config including the token
        worker.process(&job.encode().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn filter_rejection_is_a_silent_noop() {
        let (worker, _) = test_worker();

        let mut job = job("gmail_receive", "print_reaction");
        job.action.params = json!({
            "message_id": "m1",
            "sender": "bob@example.com",
            "subject": "hello",
            "snippet": "hi there",
            "received_at": "1700000000",
        })
        .as_object()
        .unwrap()
        .clone();
        job.action.config = json!({"filter_sender": "alice@example.com"})
            .as_object()
            .unwrap()
            .clone();

        // sender does not match the filter: Ok(()), no reaction, no error
        worker.process(&job.encode().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_action_params_name_the_field() {
        let (worker, _) = test_worker();

        // gmail_receive requires message_id et al.
        let job = job("gmail_receive", "print_reaction");
        let err = worker.process(&job.encode().unwrap()).await.unwrap_err();
        match err {
            WorkerError::InvalidActionConfig(config_err) => {
                assert!(config_err.to_string().contains("message_id"));
            }
            other => panic!("expected invalid action config, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pop_then_process_drains_the_queue() {
        let (worker, queue) = test_worker();
        let job = job("time_action", "print_reaction");
        queue.push(&job.encode().unwrap()).await.unwrap();
        assert_eq!(queue.len(), 1);

        let payload = queue.pop().await.unwrap().unwrap();
        worker.process(&payload).await.unwrap();
        assert!(queue.is_empty());
    }
}
