//! Severity-based routing into normal and elevated bands

use serde::{Deserialize, Serialize};

use super::level::Severity;

/// Severity partition an event is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// Below the threshold
    Normal,
    /// At or above the threshold
    Elevated,
}

impl Band {
    /// Every band, in routing order
    pub const ALL: [Band; 2] = [Band::Normal, Band::Elevated];

    /// Whether this band takes events of `severity` given `threshold`
    ///
    /// The predicates are complementary ranges over the severity order, so exactly
    /// one band accepts any severity.
    pub fn accepts(&self, severity: Severity, threshold: Severity) -> bool {
        match self {
            Band::Normal => severity < threshold,
            Band::Elevated => severity >= threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Normal => "normal",
            Band::Elevated => "elevated",
        }
    }
}

/// Routes severities to bands around a fixed threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityRouter {
    threshold: Severity,
}

impl SeverityRouter {
    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Select the band for a severity
    pub fn route(&self, severity: Severity) -> Band {
        if Band::Elevated.accepts(severity, self.threshold) {
            Band::Elevated
        } else {
            Band::Normal
        }
    }
}

impl Default for SeverityRouter {
    fn default() -> Self {
        Self::new(Severity::Warn)
    }
}
