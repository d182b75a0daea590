use anyhow::Result;
use mtfprocess::{config::Config, logging, schedule::run_service};
use std::env;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // ─── 1) configuration ────────────────────────────────────────────
    let config = Config::load()?;
    config.validate()?;
    config.prepare()?;

    // ─── 2) init logging ─────────────────────────────────────────────
    let log_path = logging::init(&config.state_dir)?;
    std::panic::set_hook(Box::new(|info| {
        error!("panic: {}", info);
    }));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log = %log_path.display(),
        "Starting MTF disclosure reports processing automation"
    );
    if let Ok(cwd) = env::current_dir() {
        info!("Running from: {}", cwd.display());
    }
    info!("Watching {}", config.archive_path().display());
    info!("Processed files will be saved to: {}", config.output_root.display());

    // ─── 3) run until interrupted ────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for interrupt: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = run_service(config, shutdown).await {
        error!("Fatal error in main program: {:?}", e);
        return Err(e);
    }
    Ok(())
}
