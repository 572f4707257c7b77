use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert level derived from memory usage, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Notice,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "🟢",
            AlertLevel::Notice => "🟡",
            AlertLevel::Warning => "🟠",
            AlertLevel::Critical => "🔴",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Notice => "notice",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }

    pub fn is_elevated(&self) -> bool {
        *self != AlertLevel::Normal
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated usage thresholds in percent.
///
/// Construction guarantees `0 <= notice < warning < critical <= 100`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    notice: f64,
    warning: f64,
    critical: f64,
}

impl Thresholds {
    pub fn new(notice: f64, warning: f64, critical: f64) -> Result<Self> {
        for (name, value) in [("notice", notice), ("warning", warning), ("critical", critical)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} threshold must be within 0-100, got: {}",
                    name, value
                )));
            }
        }

        if !(notice < warning && warning < critical) {
            return Err(Error::InvalidConfig(format!(
                "thresholds must be strictly increasing (notice < warning < critical), got: {} / {} / {}",
                notice, warning, critical
            )));
        }

        Ok(Self {
            notice,
            warning,
            critical,
        })
    }

    pub fn notice(&self) -> f64 {
        self.notice
    }

    pub fn warning(&self) -> f64 {
        self.warning
    }

    pub fn critical(&self) -> f64 {
        self.critical
    }

    /// Highest level whose threshold `usage_percent` meets or exceeds
    pub fn classify(&self, usage_percent: f64) -> AlertLevel {
        if usage_percent >= self.critical {
            AlertLevel::Critical
        } else if usage_percent >= self.warning {
            AlertLevel::Warning
        } else if usage_percent >= self.notice {
            AlertLevel::Notice
        } else {
            AlertLevel::Normal
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            notice: 70.0,
            warning: 80.0,
            critical: 90.0,
        }
    }
}

pub fn classify(usage_percent: f64, thresholds: &Thresholds) -> AlertLevel {
    thresholds.classify(usage_percent)
}
