pub mod error;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use area_types::{Area, AreaId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use utils::context::AppContext;

use crate::queue::JobQueue;
use crate::registry::ComponentRegistry;
use crate::schema::{validate, ComponentKind};
use crate::store::{AreaStore, CredentialResolver};
use crate::subsystems::evaluator::Evaluator;
use error::SupervisorError;

struct EvaluatorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// The table of running evaluators, keyed by area id. Owned by the
/// supervisor; nothing else can mutate it, which is what makes the
/// at-most-one-evaluator-per-area invariant easy to keep.
#[derive(Default)]
pub struct ActiveEvaluators {
    inner: Mutex<HashMap<AreaId, EvaluatorHandle>>,
}

impl ActiveEvaluators {
    /// True when the handle was recorded; false (and the evaluator is
    /// cancelled on the spot) if the id is already taken
    fn start(&self, id: AreaId, handle: EvaluatorHandle) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.contains_key(&id) {
            handle.cancel.cancel();
            return false;
        }
        inner.insert(id, handle);
        true
    }

    fn stop(&self, id: AreaId) -> Option<EvaluatorHandle> {
        self.inner.lock().unwrap().remove(&id)
    }

    pub fn contains(&self, id: AreaId) -> bool {
        self.inner.lock().unwrap().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<AreaId> {
        let mut ids: Vec<AreaId> = self.inner.lock().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The reconciler: diffs the areas in the database against the running
/// evaluators on a fixed cycle, cancelling evaluators whose area is gone
/// and starting evaluators for areas that appeared. An area that fails
/// validation is simply not scheduled this cycle and will be retried on
/// every subsequent one.
pub struct Supervisor {
    store: Arc<dyn AreaStore>,
    credentials: Arc<dyn CredentialResolver>,
    registry: Arc<ComponentRegistry>,
    queue: Arc<dyn JobQueue>,
    poll_interval: Duration,
    active: ActiveEvaluators,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn AreaStore>,
        credentials: Arc<dyn CredentialResolver>,
        registry: Arc<ComponentRegistry>,
        queue: Arc<dyn JobQueue>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            credentials,
            registry,
            queue,
            poll_interval,
            active: ActiveEvaluators::default(),
        }
    }

    pub fn active(&self) -> &ActiveEvaluators {
        &self.active
    }

    /// Runs until the context is killed; on the way out every evaluator is
    /// cancelled and joined.
    #[instrument(skip(self, ctx), fields(subsys = "Supervisor"))]
    pub async fn run(&self, ctx: AppContext) {
        let mut kill = ctx.get_kill_receiver();
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Supervisor started"
        );

        loop {
            if let Err(err) = self.reconcile().await {
                tracing::error!("Reconcile cycle failed: {err}");
            }

            tokio::select! {
                _ = kill.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("Supervisor shutting down, stopping all evaluators");
        self.stop_all().await;
    }

    /// One reconciliation pass; also usable directly from tests
    pub async fn reconcile(&self) -> Result<(), SupervisorError> {
        let areas = self.store.list_areas().await?;
        let current: HashSet<AreaId> = areas.iter().map(|a| a.id).collect();

        // active \ current: these areas were deleted
        for id in self.active.ids() {
            if !current.contains(&id) {
                self.stop_area(id).await;
            }
        }

        // current \ active: new areas (or ones that failed last cycle)
        for area in &areas {
            if self.active.contains(area.id) {
                continue;
            }
            if let Err(err) = self.schedule(area).await {
                tracing::warn!(area_id = %area.id, "Area not scheduled this cycle: {err}");
            }
        }

        Ok(())
    }

    /// Everything that can go wrong - unknown kinds, credential lookup,
    /// config validation, trigger construction - goes wrong here, before
    /// anything is recorded in the active table. A failing area therefore
    /// shows up again as `current \ active` next cycle and is retried.
    async fn schedule(&self, area: &Area) -> Result<(), SupervisorError> {
        let Some(trigger_name) = &area.trigger else {
            tracing::debug!(area_id = %area.id, "Area has no trigger, nothing to schedule");
            return Ok(());
        };

        let entry = self.registry.trigger(trigger_name)?;

        // resolve the reaction kind up front too, so a dangling reaction
        // name is caught per cycle instead of per firing
        self.registry.reaction(&area.reaction)?;

        // the trigger runs with the *action's* credential injected - it
        // watches the action's service
        let action_service = self.registry.action(&area.action)?.service;
        let token = self
            .credentials
            .resolve(area.user_id, action_service)
            .await?;

        let mut options = area.trigger_config.clone();
        options.insert(
            "token".to_string(),
            match &token {
                Some(token) => serde_json::Value::String(token.as_str().to_string()),
                None => serde_json::Value::Null,
            },
        );

        let config = validate(ComponentKind::Trigger, &entry.schema, &options)?;
        let interval = Duration::from_secs(config.interval_secs());
        let trigger = (entry.ctor)(config)?;

        let cancel = CancellationToken::new();
        let evaluator = Evaluator::new(
            area.clone(),
            trigger_name.clone(),
            trigger,
            interval,
            self.registry.clone(),
            self.credentials.clone(),
            self.queue.clone(),
            cancel.clone(),
        );

        let join = tokio::spawn(evaluator.run());
        if self.active.start(area.id, EvaluatorHandle { cancel, join }) {
            tracing::info!(area_id = %area.id, trigger = %trigger_name, "Evaluator started");
        }

        Ok(())
    }

    async fn stop_area(&self, id: AreaId) {
        if let Some(handle) = self.active.stop(id) {
            handle.cancel.cancel();
            if let Err(err) = handle.join.await {
                tracing::error!(area_id = %id, "Evaluator task ended abnormally: {err}");
            }
            tracing::info!(area_id = %id, "Evaluator cancelled");
        }
    }

    async fn stop_all(&self) {
        for id in self.active.ids() {
            self.stop_area(id).await;
        }
    }
}
