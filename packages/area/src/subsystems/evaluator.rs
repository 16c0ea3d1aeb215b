pub mod error;

use std::sync::Arc;
use std::time::Duration;

use area_types::{Area, ComponentName, Job, JobStep, JobTrigger, TriggerResponse};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::components::Trigger;
use crate::queue::JobQueue;
use crate::registry::ComponentRegistry;
use crate::store::CredentialResolver;
use error::EvaluatorError;

/// Back-off after a failed evaluation or publish, so a broken upstream
/// doesn't spin the loop
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// One long-running task per area: owns the trigger instance, turns its
/// firings into jobs, and pushes them onto the shared queue in firing
/// order. Never exits on its own - only cancellation ends it.
pub struct Evaluator {
    area: Area,
    trigger_name: ComponentName,
    trigger: Box<dyn Trigger>,
    interval: Duration,
    registry: Arc<ComponentRegistry>,
    credentials: Arc<dyn CredentialResolver>,
    queue: Arc<dyn JobQueue>,
    cancel: CancellationToken,
}

impl Evaluator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        area: Area,
        trigger_name: ComponentName,
        trigger: Box<dyn Trigger>,
        interval: Duration,
        registry: Arc<ComponentRegistry>,
        credentials: Arc<dyn CredentialResolver>,
        queue: Arc<dyn JobQueue>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            area,
            trigger_name,
            trigger,
            interval,
            registry,
            credentials,
            queue,
            cancel,
        }
    }

    #[instrument(skip(self), fields(subsys = "Evaluator", area_id = %self.area.id))]
    pub async fn run(mut self) {
        tracing::info!(trigger = %self.trigger_name, "Evaluator started");

        loop {
            // every suspension point races the cancellation token, so a
            // blocking gateway read cannot outlive its area
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.trigger.evaluate() => result,
            };

            match result {
                Ok(Some(response)) => {
                    tracing::debug!(
                        trigger = %self.trigger_name,
                        triggered_at = response.triggered_at,
                        "Trigger fired"
                    );
                    if let Err(err) = self.publish(response).await {
                        tracing::error!("Failed to enqueue job: {err}");
                        if self.pause(ERROR_BACKOFF).await {
                            break;
                        }
                        continue;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(trigger = %self.trigger_name, "Trigger evaluation failed: {err}");
                    if self.pause(ERROR_BACKOFF).await {
                        break;
                    }
                    continue;
                }
            }

            if self.pause(self.interval).await {
                break;
            }
        }

        // release gateway sockets etc. before the supervisor's join returns
        self.trigger.shutdown().await;
        tracing::info!("Evaluator stopped");
    }

    /// Returns true when cancelled mid-sleep
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }

    /// Build the complete job for one firing and push it as a single
    /// payload. Credentials are resolved fresh here, once per firing, and
    /// separately for the action and reaction sides - the two components
    /// may belong to different services.
    async fn publish(&self, response: TriggerResponse) -> Result<(), EvaluatorError> {
        let event_data = response.to_map();

        let action_entry = self.registry.action(&self.area.action)?;
        let reaction_entry = self.registry.reaction(&self.area.reaction)?;

        let action_token = self
            .credentials
            .resolve(self.area.user_id, action_entry.service)
            .await?;
        let reaction_token = self
            .credentials
            .resolve(self.area.user_id, reaction_entry.service)
            .await?;

        // the action's declared config fields decide which event keys it
        // receives; everything else is dropped here
        let mut action_params = Map::new();
        for name in action_entry.schema.field_names() {
            if let Some(value) = event_data.get(name) {
                action_params.insert(name.to_string(), value.clone());
            }
        }

        // the reaction sees the whole event, overlaid with its option map
        let mut reaction_params = event_data.clone();
        for (key, value) in &self.area.reaction_config {
            reaction_params.insert(key.clone(), value.clone());
        }

        let mut action = JobStep::new(action_entry.name.clone());
        action.params = action_params;
        action.config = self.area.action_config.clone();
        let action = action.with_token(action_token.as_ref());

        let mut reaction = JobStep::new(reaction_entry.name.clone());
        reaction.params = reaction_params;
        reaction.config = self.area.reaction_config.clone();
        let reaction = reaction.with_token(reaction_token.as_ref());

        let job = Job {
            trigger: JobTrigger {
                name: self.trigger_name.clone(),
            },
            action,
            reaction,
            event_data: Value::Object(event_data),
        };

        let payload = job.encode()?;
        self.queue.push(&payload).await?;

        tracing::info!(
            action = %self.area.action,
            reaction = %self.area.reaction,
            "Job enqueued"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::register_builtins;
    use crate::queue::MemoryQueue;
    use crate::schema::{validate, ComponentKind};
    use crate::store::MemoryStore;
    use area_types::Credential;
    use serde_json::json;

    fn test_registry() -> Arc<ComponentRegistry> {
        let mut registry = ComponentRegistry::new();
        register_builtins(&mut registry).unwrap();
        Arc::new(registry)
    }

    fn always_firing_trigger(registry: &ComponentRegistry) -> (Box<dyn Trigger>, Duration) {
        let entry = registry.trigger("time_trigger").unwrap();
        let options = json!({"interval": 1, "last_run": 0.0})
            .as_object()
            .unwrap()
            .clone();
        let config = validate(ComponentKind::Trigger, &entry.schema, &options).unwrap();
        let interval = Duration::from_secs(config.interval_secs());
        ((entry.ctor)(config).unwrap(), interval)
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_token_is_injected_into_both_sides() {
        let registry = test_registry();
        let store = MemoryStore::new();
        let queue = Arc::new(MemoryQueue::new());

        // action and reaction both resolve under "core" for the built-in
        // time components, so give the user one core credential and check
        // it lands on both sides; the per-service split is covered by the
        // reconciler integration tests with cross-service areas
        store.set_credential(7.into(), "core", Credential::new("A-TOK".into()));

        let area = Area::new(
            1,
            7,
            ComponentName::new("time_action").unwrap(),
            ComponentName::new("print_reaction").unwrap(),
        );

        let (trigger, interval) = always_firing_trigger(&registry);
        let cancel = CancellationToken::new();
        let evaluator = Evaluator::new(
            area,
            ComponentName::new("time_trigger").unwrap(),
            trigger,
            interval,
            registry,
            Arc::new(store),
            queue.clone(),
            cancel.clone(),
        );

        let handle = tokio::spawn(evaluator.run());

        // let a couple of ticks elapse on the paused clock
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        handle.await.unwrap();

        let payload = queue.pop().await.unwrap().expect("at least one job");
        let job = Job::decode(&payload).unwrap();
        assert_eq!(job.trigger.name.as_ref(), "time_trigger");
        assert_eq!(job.action.token(), Some("A-TOK"));
        assert_eq!(job.reaction.token(), Some("A-TOK"));
        assert!(job.event_data["triggered_at"].as_f64().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn absent_credential_still_enqueues_with_null_token() {
        let registry = test_registry();
        let store = MemoryStore::new(); // no credentials at all
        let queue = Arc::new(MemoryQueue::new());

        let area = Area::new(
            2,
            9,
            ComponentName::new("time_action").unwrap(),
            ComponentName::new("print_reaction").unwrap(),
        );

        let (trigger, interval) = always_firing_trigger(&registry);
        let cancel = CancellationToken::new();
        let evaluator = Evaluator::new(
            area,
            ComponentName::new("time_trigger").unwrap(),
            trigger,
            interval,
            registry,
            Arc::new(store),
            queue.clone(),
            cancel.clone(),
        );

        let handle = tokio::spawn(evaluator.run());
        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        cancel.cancel();
        handle.await.unwrap();

        let payload = queue.pop().await.unwrap().expect("job enqueued");
        let job = Job::decode(&payload).unwrap();
        assert_eq!(job.action.config["token"], Value::Null);
        assert_eq!(job.reaction.config["token"], Value::Null);
    }

    /// Fires on every tick with a monotonically increasing sequence, so
    /// ordering can be asserted without touching the wall clock
    struct CountingTrigger {
        fired: u64,
    }

    #[async_trait::async_trait]
    impl Trigger for CountingTrigger {
        fn name(&self) -> &'static str {
            "counting_trigger"
        }

        async fn evaluate(
            &mut self,
        ) -> Result<Option<TriggerResponse>, crate::components::ComponentError> {
            self.fired += 1;
            Ok(Some(TriggerResponse::new("{}").with_field("seq", self.fired)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn firing_order_is_preserved() {
        let registry = test_registry();
        let queue = Arc::new(MemoryQueue::new());

        let area = Area::new(
            3,
            9,
            ComponentName::new("time_action").unwrap(),
            ComponentName::new("print_reaction").unwrap(),
        );

        let cancel = CancellationToken::new();
        let evaluator = Evaluator::new(
            area,
            ComponentName::new("time_trigger").unwrap(),
            Box::new(CountingTrigger { fired: 0 }),
            Duration::from_secs(1),
            registry,
            Arc::new(MemoryStore::new()),
            queue.clone(),
            cancel.clone(),
        );

        let handle = tokio::spawn(evaluator.run());
        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        handle.await.unwrap();

        let mut last = 0;
        let mut count = 0;
        while let Some(payload) = queue.pop().await.unwrap() {
            let job = Job::decode(&payload).unwrap();
            let seq = job.event_data["seq"].as_u64().unwrap();
            assert!(seq > last, "jobs must dequeue in firing order");
            last = seq;
            count += 1;
        }
        assert!(count >= 2, "expected multiple firings, got {count}");
    }
}
