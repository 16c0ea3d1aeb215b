#![allow(clippy::uninlined_format_args)]

pub mod args;
pub mod clients;
pub mod components;
pub mod config;
pub mod filter;
pub mod queue;
pub mod registry;
pub mod schema;
pub mod store;
pub mod subsystems;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use queue::{JobQueue, RedisQueue};
use registry::ComponentRegistry;
use store::{AreaStore, CredentialResolver, PgStore};
use subsystems::{supervisor::Supervisor, worker::Worker};
use utils::context::AppContext;

pub use utils::telemetry::init_tracing_tests;

/// The wired-up node: one frozen registry plus the store, credential, and
/// queue backends everything runs against. Tests assemble this from the
/// in-memory backends; main assembles it from postgres + redis.
pub struct App {
    pub registry: Arc<ComponentRegistry>,
    pub store: Arc<dyn AreaStore>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub queue: Arc<dyn JobQueue>,
}

impl App {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        store: Arc<dyn AreaStore>,
        credentials: Arc<dyn CredentialResolver>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            registry,
            store,
            credentials,
            queue,
        }
    }

    /// Production wiring: builtin components, postgres store, redis queue
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let mut registry = ComponentRegistry::new();
        components::register_builtins(&mut registry)?;

        let store = PgStore::connect(&config.postgres.make_db_url()).await?;
        let queue = RedisQueue::connect(&config.redis.make_url(), &config.queue_name).await?;

        Ok(Self {
            registry: Arc::new(registry),
            store: Arc::new(store.clone()),
            credentials: Arc::new(store),
            queue: Arc::new(queue),
        })
    }
}

/// Entry point to start up the whole node.
/// Called from main and the end-to-end tests; returns when the context is
/// killed (ctrl-c or a test calling `ctx.kill()`).
pub fn run_server(ctx: AppContext, config: Config, app: App) {
    let _ = ctrlc::set_handler({
        let ctx = ctx.clone();
        move || {
            ctx.kill();
        }
    });

    // the workers drain the queue independently of the supervisor
    for id in 0..config.workers.max(1) {
        let worker = Worker::new(id, app.queue.clone(), app.registry.clone());
        ctx.rt.spawn(worker.run(ctx.clone()));
    }

    let supervisor = Supervisor::new(
        app.store,
        app.credentials,
        app.registry,
        app.queue,
        Duration::from_secs(config.poll_interval_secs),
    );

    // runs until killed; cancels and joins every evaluator on the way out
    ctx.rt.block_on(supervisor.run(ctx.clone()));
}
