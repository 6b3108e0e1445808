use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// A single token-range predicate and the multipliers it yields when matched.
///
/// Bounds are absolute token counts. A bound of `0` means "no bound on that
/// side"; the exclusivity flags only take effect for non-zero bounds and
/// default to inclusive comparisons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRule {
    /// Minimum input tokens, 0 means no lower bound
    pub input_min: u64,
    /// Maximum input tokens, 0 means no upper bound
    pub input_max: u64,
    /// Whether input_min is exclusive (>), default inclusive (>=)
    #[serde(skip_serializing_if = "is_false")]
    pub input_min_exclusive: bool,
    /// Whether input_max is exclusive (<), default inclusive (<=)
    #[serde(skip_serializing_if = "is_false")]
    pub input_max_exclusive: bool,

    /// Minimum output tokens, 0 means no lower bound
    pub output_min: u64,
    /// Maximum output tokens, 0 means no upper bound
    pub output_max: u64,
    #[serde(skip_serializing_if = "is_false")]
    pub output_min_exclusive: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub output_max_exclusive: bool,

    /// Multiplier applied to input token cost when this rule matches
    pub model_ratio: f64,
    /// Multiplier applied to output token cost when this rule matches
    pub completion_ratio: f64,

    /// Rules with higher priority are evaluated first
    pub priority: i32,
}

/// All segmented pricing rules for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentedRatioConfig {
    pub model_name: String,
    pub rules: Vec<SegmentRule>,
    /// When false, the model is billed as if it had no segmented pricing
    pub enabled: bool,
}

impl SegmentedRatioConfig {
    /// Administrative write-path validation.
    ///
    /// The store itself accepts any configuration; this gate runs before any
    /// mutation, so a rejected payload has no effect. Messages carry the
    /// 1-based rule index so the caller can point at the offending rule.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.model_name.is_empty() {
            return Err(AppError::Validation("model_name must not be empty".to_string()));
        }
        if self.rules.is_empty() {
            return Err(AppError::Validation("at least one rule is required".to_string()));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate(i + 1)?;
        }
        Ok(())
    }

    /// Stable-sort the rules by priority descending, the order the match
    /// engine evaluates them in. Equal priorities keep their input order.
    pub fn sort_rules(&mut self) {
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }
}

impl SegmentRule {
    fn validate(&self, index: usize) -> Result<(), AppError> {
        if self.input_max > 0 && self.input_min > self.input_max {
            return Err(AppError::Validation(format!(
                "rule {}: input_min must not exceed input_max",
                index
            )));
        }
        if self.output_max > 0 && self.output_min > self.output_max {
            return Err(AppError::Validation(format!(
                "rule {}: output_min must not exceed output_max",
                index
            )));
        }
        // `!(x >= 0.0)` also rejects NaN
        if !(self.model_ratio >= 0.0) {
            return Err(AppError::Validation(format!(
                "rule {}: model_ratio must not be negative",
                index
            )));
        }
        if !(self.completion_ratio >= 0.0) {
            return Err(AppError::Validation(format!(
                "rule {}: completion_ratio must not be negative",
                index
            )));
        }
        Ok(())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
