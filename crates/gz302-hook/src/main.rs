use std::process::ExitCode;

use clap::Parser;
use gz302_hook::{Cli, Coordinator, HookConfig, logging};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let config = HookConfig::load_or_default(cli.config.as_deref());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            // Devices stay untouched; the sleep proceeds either way.
            error!(error = %e, "Failed to start runtime");
            return ExitCode::SUCCESS;
        }
    };

    let mut coordinator = Coordinator::from_config(config);
    runtime.block_on(coordinator.run(cli.phase, cli.action))
}
