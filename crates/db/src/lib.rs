//! MongoDB client factory, index migrations and the `db` core module.
//!
//! A [`Store`] is created once during startup and handed to whatever needs the
//! database; nothing in the process reaches it through a global.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bookstore_kernel::settings::DatabaseSettings;
use bookstore_kernel::{InitCtx, Migration, Module};
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

const APP_NAME: &str = "bookstore";

/// Connected handle on the configured database.
///
/// Cloning is cheap; clones share the driver's connection pool.
#[derive(Clone, Debug)]
pub struct Store {
    client: Client,
    database: Database,
}

impl Store {
    /// Connect to the store and verify it answers a ping.
    ///
    /// Failing here is fatal for the process: the service never starts listening
    /// without a reachable store.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(&settings.uri)
            .await
            .context("invalid document store URI")?;
        options.app_name = Some(APP_NAME.to_string());

        let client = Client::with_options(options).context("failed to create store client")?;
        let store = Self {
            database: client.database(&settings.name),
            client,
        };

        store
            .ping()
            .await
            .with_context(|| format!("database '{}' is unreachable", settings.name))?;

        tracing::info!(target: "bookstore-db", database = %settings.name, "connected to document store");
        Ok(store)
    }

    /// Round-trip a `ping` command.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .context("ping failed")?;
        Ok(())
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Typed handle on a collection of the configured database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database.collection::<T>(name)
    }

    /// Create every index the modules declared. Index creation is idempotent, so
    /// migrations run on every boot.
    pub async fn apply_migrations(&self, migrations: &[(String, Migration)]) -> anyhow::Result<()> {
        for (module, migration) in migrations {
            self.database
                .collection::<Document>(migration.collection)
                .create_index(index_model(migration))
                .await
                .with_context(|| {
                    format!(
                        "failed to apply migration '{}' of module '{}'",
                        migration.id, module
                    )
                })?;

            tracing::info!(
                target: "bookstore-db",
                module = %module,
                migration = migration.id,
                index = migration.index.name,
                "migration applied"
            );
        }

        Ok(())
    }

    /// Close every pooled connection. Runs after the HTTP drain, so cursors left
    /// behind by abandoned requests are not waited for.
    pub async fn close(self) {
        self.client.shutdown().immediate(true).await;
        tracing::info!(target: "bookstore-db", "document store connection closed");
    }
}

fn index_model(migration: &Migration) -> IndexModel {
    let mut keys = Document::new();
    for field in migration.index.fields {
        keys.insert(*field, 1);
    }

    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(migration.index.name.to_string())
                .unique(migration.index.unique)
                .build(),
        )
        .build()
}

/// Core module owning the store connection for the process lifetime.
pub struct DbModule {
    store: Store,
}

impl DbModule {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            database = %ctx.settings.database.name,
            "db module initialized"
        );
        Ok(())
    }

    /// Runs last during shutdown, once every request has drained.
    async fn stop(&self) -> anyhow::Result<()> {
        self.store.clone().close().await;
        Ok(())
    }
}

/// Create the `db` core module around an established connection
pub fn create_module(store: Store) -> Arc<dyn Module> {
    Arc::new(DbModule::new(store))
}
