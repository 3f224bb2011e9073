use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use bookstore_db::Store;
use bookstore_http::lifecycle::{DrainOutcome, Lifecycle};
use bookstore_kernel::{InitCtx, ModuleRegistry, Settings};

use crate::modules;

/// Run the service until `shutdown` resolves.
///
/// Connecting to the store, module init and migrations all happen before the
/// listener is bound; any failure there aborts startup. After the drain every
/// module is stopped in reverse registration order, the store connection last.
pub async fn run<F>(settings: Settings, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let lifecycle = Lifecycle::new(Duration::from_secs(settings.server.shutdown_timeout_secs));

    let store = Store::connect(&settings.database)
        .await
        .context("failed to connect to the document store")?;

    let mut registry = ModuleRegistry::new();
    registry.register_core(bookstore_db::create_module(store.clone()));
    modules::register_all(&mut registry, &store);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;
    store
        .apply_migrations(&registry.collect_migrations())
        .await
        .context("failed to apply index migrations")?;
    registry.start_all(&ctx).await?;

    let served = bookstore_http::start_server(&registry, &settings, &lifecycle, shutdown).await;

    let stopped = registry.stop_all().await;
    lifecycle.mark_stopped();

    match served? {
        DrainOutcome::Completed => tracing::info!("server stopped"),
        DrainOutcome::TimedOut => tracing::warn!(
            timeout_secs = settings.server.shutdown_timeout_secs,
            "server stopped before every request finished"
        ),
    }
    stopped
}
