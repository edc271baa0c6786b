pub mod calming;
pub mod coordinator;
pub mod intervention;
pub mod models;
pub mod narration;
pub mod sensing;
pub mod settings;
pub mod shell;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tutor;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use coordinator::{CoordinatorDeps, CoordinatorHandle};
use settings::SettingsStore;

pub fn run() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("EmoLearn starting up...");

    let settings = Arc::new(SettingsStore::from_env()?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(async move {
        let deps = CoordinatorDeps::from_settings(&settings.snapshot());
        let (handle, coordinator) = CoordinatorHandle::spawn(settings, deps);
        shell::run_shell(handle, coordinator).await
    });
    // a pending stdin read would otherwise block shutdown
    runtime.shutdown_background();
    result?;

    log::info!("EmoLearn shut down");
    Ok(())
}
