//! Routing events to per-band rotating sinks

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::event::{FieldValue, LogEvent};
use super::format::format_event;
use super::level::Severity;
use super::retention::PruneReport;
use super::rotating::{RotatingFileSink, RotationPolicy};
use super::router::{Band, SeverityRouter};
use crate::error::{ConfigError, SinkError};

/// Default filter directive when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Everything needed to build a [`LogPipeline`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Events at or above this go to the elevated sink
    pub threshold: Severity,
    pub normal: RotationPolicy,
    pub elevated: RotationPolicy,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl LogConfig {
    /// Hourly, week-long partitions in `log_dir` with the default threshold
    pub fn new(
        log_dir: impl AsRef<Path>,
        normal_name: impl Into<String>,
        elevated_name: impl Into<String>,
    ) -> Self {
        let log_dir = log_dir.as_ref();
        Self {
            threshold: Severity::Warn,
            normal: RotationPolicy::new(log_dir, normal_name),
            elevated: RotationPolicy::new(log_dir, elevated_name),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    /// Apply the same change to both band policies
    pub fn map_policies(mut self, f: impl Fn(RotationPolicy) -> RotationPolicy) -> Self {
        self.normal = f(self.normal);
        self.elevated = f(self.elevated);
        self
    }

    pub fn policy(&self, band: Band) -> &RotationPolicy {
        match band {
            Band::Normal => &self.normal,
            Band::Elevated => &self.elevated,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.normal.validate()?;
        self.elevated.validate()?;
        if self.normal.alias_path() == self.elevated.alias_path() {
            return Err(ConfigError::DuplicateLogName(self.normal.name().to_string()));
        }
        Ok(())
    }
}

/// Severity router feeding one rotating sink per band
#[derive(Debug)]
pub struct LogPipeline {
    router: SeverityRouter,
    normal: RotatingFileSink,
    elevated: RotatingFileSink,
}

impl LogPipeline {
    pub fn new(config: &LogConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build with a shared clock for both sinks
    pub fn with_clock(config: &LogConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            router: SeverityRouter::new(config.threshold),
            normal: RotatingFileSink::with_clock(config.normal.clone(), Arc::clone(&clock))?,
            elevated: RotatingFileSink::with_clock(config.elevated.clone(), clock)?,
        })
    }

    pub fn router(&self) -> &SeverityRouter {
        &self.router
    }

    pub fn sink(&self, band: Band) -> &RotatingFileSink {
        match band {
            Band::Normal => &self.normal,
            Band::Elevated => &self.elevated,
        }
    }

    /// Alias paths of both sinks
    pub fn alias_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.normal.policy().alias_path(),
            self.elevated.policy().alias_path(),
        )
    }

    /// Format and write an event to its band's sink
    ///
    /// Returns the band written to.
    pub fn write_event(&self, event: &LogEvent) -> Result<Band, SinkError> {
        let band = self.router.route(event.severity);
        self.sink(band).write(&format_event(event))?;
        Ok(band)
    }

    /// Build an event stamped now and write it
    pub fn emit<I, K, V>(
        &self,
        severity: Severity,
        source_location: &str,
        message: &str,
        fields: I,
    ) -> Result<Band, SinkError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let event = fields.into_iter().fold(
            LogEvent::new(severity, source_location, message),
            |event, (key, value)| event.with_field(key, value),
        );
        self.write_event(&event)
    }

    /// Prune both sinks now instead of waiting for the next rotation
    pub fn prune(&self) -> Vec<(Band, PruneReport)> {
        Band::ALL
            .iter()
            .map(|band| (*band, self.sink(*band).prune()))
            .collect()
    }
}
