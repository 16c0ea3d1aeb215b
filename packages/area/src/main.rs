use clap::Parser;
use utils::{context::AppContext, telemetry};

use area::{args::CliArgs, config::Config, App};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = Config::from_args(args)?;

    telemetry::init_tracing(config.tracing_env_filter()?)?;

    let ctx = AppContext::new();

    let app = ctx.rt.block_on(App::connect(&config))?;
    tracing::info!("Connected to database and queue, starting node");

    area::run_server(ctx, config, app);

    Ok(())
}
