//! Tracing integration
//!
//! Installs the pipeline as a `tracing` layer so business code can log with the usual
//! `tracing::info!` / `tracing::warn!` macros.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::event::{short_caller, FieldValue, LogEvent};
use super::pipeline::{LogConfig, LogPipeline};

/// Where the current logs can be read
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    /// Alias of the newest normal-band partition
    pub normal_path: PathBuf,
    /// Alias of the newest elevated-band partition
    pub elevated_path: PathBuf,
}

/// A tracing layer that writes every event through a [`LogPipeline`]
pub struct PipelineLayer {
    pipeline: Arc<LogPipeline>,
}

impl PipelineLayer {
    pub fn new(pipeline: Arc<LogPipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let source_location = match metadata.file() {
            Some(file) => short_caller(file, metadata.line()),
            None => metadata.target().to_string(),
        };

        let log_event = LogEvent {
            timestamp: Local::now(),
            severity: (*metadata.level()).into(),
            source_location,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };

        // Sink failures end this logging path; there is no caller to return them to
        if let Err(e) = self.pipeline.write_event(&log_event) {
            panic!("log pipeline failed: {}", e);
        }
    }
}

/// Collects the message and typed fields of an event
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, FieldValue)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: FieldValue) {
        self.fields.push((field.name().to_string(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);

        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.push(field, FieldValue::Str(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, FieldValue::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, FieldValue::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, FieldValue::Str(value.to_string()));
    }
}

/// Guard that keeps the logging pipeline alive
pub struct LoggingGuard {
    pipeline: Arc<LogPipeline>,
}

impl LoggingGuard {
    /// Direct access for callers that want write errors returned instead of panicking
    pub fn pipeline(&self) -> &Arc<LogPipeline> {
        &self.pipeline
    }
}

/// Initialize split logging as the global tracing subscriber
///
/// Returns the alias paths and a guard that must be kept alive for the duration of logging.
pub fn init_logging(config: &LogConfig) -> Result<(LogFileInfo, LoggingGuard)> {
    for dir in [config.normal.log_dir(), config.elevated.log_dir()] {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;
    }

    let pipeline = Arc::new(LogPipeline::new(config).context("Invalid logging configuration")?);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(PipelineLayer::new(Arc::clone(&pipeline)))
        .try_init()
        .context("Failed to install log subscriber")?;

    let (normal_path, elevated_path) = pipeline.alias_paths();
    let info = LogFileInfo {
        normal_path,
        elevated_path,
    };

    Ok((info, LoggingGuard { pipeline }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::format::parse_line;
    use crate::logging::level::Severity;
    use tempfile::TempDir;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_layer_routes_tracing_events() {
        let temp_dir = TempDir::new().unwrap();
        let config = LogConfig::new(temp_dir.path(), "access.log", "error.log");
        let pipeline = Arc::new(LogPipeline::new(&config).unwrap());
        let subscriber =
            tracing_subscriber::registry().with(PipelineLayer::new(Arc::clone(&pipeline)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(pid = 4242_u32, user = "ops team", "Server started");
            tracing::debug!(ratio = 0.5, ok = true, "Tuned");
            tracing::warn!(count = 42_i64, "Warning with field");
            tracing::error!(peer = ?("10.0.0.1", 443), "Connection lost");
        });

        let (normal, elevated) = pipeline.alias_paths();
        let normal: Vec<_> = fs::read_to_string(normal)
            .unwrap()
            .lines()
            .map(|l| parse_line(l).unwrap())
            .collect();
        let elevated: Vec<_> = fs::read_to_string(elevated)
            .unwrap()
            .lines()
            .map(|l| parse_line(l).unwrap())
            .collect();

        assert_eq!(normal.len(), 2);
        assert_eq!(normal[0].severity, Severity::Info);
        assert_eq!(normal[0].message, "Server started");
        assert_eq!(
            normal[0].fields,
            vec![
                ("pid".to_string(), FieldValue::I64(4242)),
                ("user".to_string(), FieldValue::Str("ops team".to_string())),
            ]
        );
        assert!(normal[0].source_location.contains("layer.rs:"));
        assert_eq!(
            normal[1].fields,
            vec![
                ("ratio".to_string(), FieldValue::F64(0.5)),
                ("ok".to_string(), FieldValue::Bool(true)),
            ]
        );

        assert_eq!(elevated.len(), 2);
        assert_eq!(elevated[0].severity, Severity::Warn);
        assert_eq!(elevated[0].fields, vec![("count".to_string(), FieldValue::I64(42))]);
        assert_eq!(elevated[1].severity, Severity::Error);
        assert_eq!(
            elevated[1].fields,
            vec![(
                "peer".to_string(),
                FieldValue::Str("(\"10.0.0.1\", 443)".to_string())
            )]
        );
    }

    #[test]
    fn test_visitor_keeps_field_order() {
        let temp_dir = TempDir::new().unwrap();
        let config = LogConfig::new(temp_dir.path(), "access.log", "error.log")
            .with_threshold(Severity::Trace);
        let pipeline = Arc::new(LogPipeline::new(&config).unwrap());
        let subscriber =
            tracing_subscriber::registry().with(PipelineLayer::new(Arc::clone(&pipeline)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::trace!(z = 1_i64, a = 2_i64, m = 3_i64, "ordered");
        });

        let content = fs::read_to_string(pipeline.alias_paths().1).unwrap();
        let parsed = parse_line(content.trim_end()).unwrap();
        let keys: Vec<_> = parsed.fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
