//! Tracing bootstrap for the bookstore service.
//!
//! Installs a global subscriber with an [`EnvFilter`], a pretty or JSON stdout
//! layer and, when `telemetry.log_path` is set, a JSON file layer receiving every
//! event that passes the filter.

use std::fs::File;
use std::sync::Mutex;

use anyhow::Context;
use bookstore_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize the global tracing pipeline.
///
/// Fails if the log file cannot be created or a global subscriber is already set.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = build_filter(settings)?;
    let layers = build_layers(settings)?;

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to install the tracing subscriber")?;

    tracing::debug!(
        target: "bookstore-telemetry",
        format = ?settings.log_format,
        log_path = ?settings.log_path,
        "telemetry initialized"
    );
    Ok(())
}

/// `RUST_LOG` when present, otherwise the configured level.
fn build_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_level)
            .with_context(|| format!("invalid log level '{}'", settings.log_level)),
    }
}

fn build_layers(settings: &TelemetrySettings) -> anyhow::Result<Vec<BoxedLayer>> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);

    layers.push(match settings.log_format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    });

    if let Some(path) = &settings.log_path {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_is_added_when_log_path_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let settings = TelemetrySettings {
            log_path: Some(dir.path().join("bookstore.log")),
            ..TelemetrySettings::default()
        };

        let layers = build_layers(&settings).unwrap();

        assert_eq!(layers.len(), 2);
        assert!(dir.path().join("bookstore.log").exists());
    }

    #[test]
    fn unwritable_log_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = TelemetrySettings {
            log_path: Some(dir.path().join("missing").join("bookstore.log")),
            ..TelemetrySettings::default()
        };

        let Err(err) = build_layers(&settings) else {
            panic!("expected build_layers to fail");
        };

        assert!(err.to_string().contains("failed to create log file"));
    }

    #[test]
    fn configured_level_is_used_as_filter() {
        let settings = TelemetrySettings {
            log_level: "warn,bookstore_app=debug".to_string(),
            ..TelemetrySettings::default()
        };

        assert!(build_filter(&settings).is_ok());
    }
}
