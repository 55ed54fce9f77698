use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Thresholds for reconciliation and pattern detection.
///
/// Every section is optional; a missing section or key takes the default
/// policy value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default)]
    pub tolerance: ToleranceConfig,
    #[serde(default)]
    pub timeliness: TimelinessConfig,
    #[serde(default)]
    pub verdict: VerdictPolicy,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceConfig {
    /// Maximum allowed deviation between the two source values, in percent.
    #[serde(default = "default_value_percent")]
    pub value_percent: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            value_percent: default_value_percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimelinessConfig {
    /// Payment is delayed when it lands more than this many days after the invoice.
    #[serde(default = "default_grace_days")]
    pub grace_days: u32,
    /// Payment delay beyond this many days is chronic.
    #[serde(default = "default_chronic_days")]
    pub chronic_days: u32,
    /// Source filings are due on this day of the month after the period.
    #[serde(default = "default_filing_due_day")]
    pub filing_due_day: u32,
}

impl Default for TimelinessConfig {
    fn default() -> Self {
        Self {
            grace_days: default_grace_days(),
            chronic_days: default_chronic_days(),
            filing_due_day: default_filing_due_day(),
        }
    }
}

/// Magnitudes at which a finding escalates from warning to high risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerdictPolicy {
    #[serde(default = "default_high_risk_value_percent")]
    pub high_risk_value_percent: f64,
    #[serde(default = "default_high_risk_filing_days")]
    pub high_risk_filing_days: i64,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            high_risk_value_percent: default_high_risk_value_percent(),
            high_risk_filing_days: default_high_risk_filing_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    /// Share of HIGH-risk partners at which an entity's network is flagged.
    #[serde(default = "default_risky_partner_ratio")]
    pub risky_partner_ratio: f64,
    /// Distinct amendment chains at which an issuer is HIGH risk.
    #[serde(default = "default_amendment_flag_count")]
    pub amendment_flag_count: usize,
    /// Hops followed along amendment links before a chain is reported as capped.
    #[serde(default = "default_amendment_max_depth")]
    pub amendment_max_depth: usize,
    /// Minimum delayed transactions before an issuer is flagged for payment delay.
    #[serde(default = "default_min_delayed")]
    pub min_delayed_transactions: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            risky_partner_ratio: default_risky_partner_ratio(),
            amendment_flag_count: default_amendment_flag_count(),
            amendment_max_depth: default_amendment_max_depth(),
            min_delayed_transactions: default_min_delayed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Wall-clock budget for a batch run. Records not started by then are skipped.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            deadline_secs: None,
        }
    }
}

fn default_value_percent() -> f64 {
    2.0
}
fn default_grace_days() -> u32 {
    60
}
fn default_chronic_days() -> u32 {
    45
}
fn default_filing_due_day() -> u32 {
    11
}
fn default_high_risk_value_percent() -> f64 {
    10.0
}
fn default_high_risk_filing_days() -> i64 {
    30
}
fn default_risky_partner_ratio() -> f64 {
    0.30
}
fn default_amendment_flag_count() -> usize {
    3
}
fn default_amendment_max_depth() -> usize {
    5
}
fn default_min_delayed() -> usize {
    1
}
fn default_workers() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let tol = self.tolerance.value_percent;
        if !tol.is_finite() || tol < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance.value_percent must be a non-negative number, got {tol}"
            )));
        }

        let high = self.verdict.high_risk_value_percent;
        if !high.is_finite() || high < tol {
            return Err(ReconError::ConfigValidation(format!(
                "verdict.high_risk_value_percent ({high}) must be at least \
                 tolerance.value_percent ({tol})"
            )));
        }

        if self.verdict.high_risk_filing_days < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "verdict.high_risk_filing_days must be non-negative, got {}",
                self.verdict.high_risk_filing_days
            )));
        }

        // Day 28 exists in every month.
        let due = self.timeliness.filing_due_day;
        if !(1..=28).contains(&due) {
            return Err(ReconError::ConfigValidation(format!(
                "timeliness.filing_due_day must be between 1 and 28, got {due}"
            )));
        }

        let ratio = self.patterns.risky_partner_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ReconError::ConfigValidation(format!(
                "patterns.risky_partner_ratio must be in (0, 1], got {ratio}"
            )));
        }

        if self.patterns.amendment_max_depth == 0 {
            return Err(ReconError::ConfigValidation(
                "patterns.amendment_max_depth must be at least 1".into(),
            ));
        }

        if self.batch.workers == 0 {
            return Err(ReconError::ConfigValidation(
                "batch.workers must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config, ReconConfig::default());
        assert_eq!(config.tolerance.value_percent, 2.0);
        assert_eq!(config.timeliness.grace_days, 60);
        assert_eq!(config.timeliness.chronic_days, 45);
        assert_eq!(config.timeliness.filing_due_day, 11);
        assert_eq!(config.verdict.high_risk_value_percent, 10.0);
        assert_eq!(config.verdict.high_risk_filing_days, 30);
        assert_eq!(config.patterns.risky_partner_ratio, 0.30);
        assert_eq!(config.patterns.amendment_flag_count, 3);
        assert_eq!(config.patterns.amendment_max_depth, 5);
        assert_eq!(config.batch.workers, 4);
        assert!(config.batch.deadline_secs.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let input = r#"
[tolerance]
value_percent = 1.5

[timeliness]
grace_days = 30

[batch]
workers = 8
deadline_secs = 120
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.tolerance.value_percent, 1.5);
        assert_eq!(config.timeliness.grace_days, 30);
        assert_eq!(config.timeliness.chronic_days, 45);
        assert_eq!(config.batch.workers, 8);
        assert_eq!(config.batch.deadline_secs, Some(120));
        assert_eq!(config.patterns, PatternConfig::default());
    }

    #[test]
    fn chronic_below_grace_is_accepted() {
        let input = r#"
[timeliness]
grace_days = 90
chronic_days = 10
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.timeliness.grace_days, 90);
        assert_eq!(config.timeliness.chronic_days, 10);
    }

    #[test]
    fn rejects_unknown_key() {
        let input = r#"
[tolerance]
value_pct = 1.5
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let input = r#"
[tolerance]
value_percent = -1.0
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn rejects_high_risk_below_tolerance() {
        let input = r#"
[tolerance]
value_percent = 12.0
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("high_risk_value_percent"));
    }

    #[test]
    fn rejects_due_day_out_of_range() {
        let input = r#"
[timeliness]
filing_due_day = 31
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("filing_due_day"));
    }

    #[test]
    fn rejects_zero_ratio_and_zero_workers() {
        let err = ReconConfig::from_toml("[patterns]\nrisky_partner_ratio = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("risky_partner_ratio"));

        let err = ReconConfig::from_toml("[batch]\nworkers = 0\n").unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn toml_round_trip() {
        let mut config = ReconConfig::default();
        config.patterns.amendment_flag_count = 7;
        let text = config.to_toml().unwrap();
        let back = ReconConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxgraph.toml");
        std::fs::write(&path, "[verdict]\nhigh_risk_filing_days = 15\n").unwrap();
        let config = ReconConfig::from_path(&path).unwrap();
        assert_eq!(config.verdict.high_risk_filing_days, 15);

        let missing = ReconConfig::from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ReconError::Io(_)));
    }
}
