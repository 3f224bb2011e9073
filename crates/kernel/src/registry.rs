use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core module initialization order (excluding HTTP server, which is started
/// separately once every module is up)
const CORE_MODULE_ORDER: &[&str] = &["db"];

/// Module registry for managing module lifecycle with core/custom separation
#[derive(Default)]
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a core module with the registry
    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        self.core_modules.push(module);
    }

    /// Register a custom module with the registry
    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// Get all registered modules (core + custom)
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.ordered_core().chain(self.custom_modules.iter()).collect()
    }

    /// Core modules in `CORE_MODULE_ORDER`, followed by any core module the order
    /// does not mention, in registration order.
    fn ordered_core(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        let known = CORE_MODULE_ORDER
            .iter()
            .filter_map(move |&name| self.core_modules.iter().find(|m| m.name() == name));
        let unknown = self
            .core_modules
            .iter()
            .filter(|m| !CORE_MODULE_ORDER.contains(&m.name()));
        known.chain(unknown)
    }

    /// Initialize core modules first, then custom modules
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.modules() {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Start core modules first, then custom modules
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.modules() {
            tracing::info!(module = module.name(), "starting module");

            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop every module in reverse start order.
    ///
    /// A failing module does not prevent the remaining ones from stopping; the
    /// first failure is returned once all of them have been asked to stop.
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        let mut first_error = None;

        for module in self.modules().into_iter().rev() {
            tracing::info!(module = module.name(), "stopping module");

            if let Err(err) = module.stop().await {
                tracing::error!(module = module.name(), error = %err, "module failed to stop");
                first_error.get_or_insert_with(|| {
                    err.context(format!("failed to stop module '{}'", module.name()))
                });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect all migrations from all modules, tagged with the owning module name
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (module.name().to_string(), migration))
            })
            .collect();

        // Sort by module name and migration ID for deterministic ordering
        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));

        migrations
    }
}
