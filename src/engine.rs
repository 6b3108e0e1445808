use crate::rule::SegmentRule;
use crate::store::RatioStore;

/// Multipliers resolved for one billing request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedRatio {
    pub model_ratio: f64,
    pub completion_ratio: f64,
}

/// Resolve the segmented pricing multipliers for one request.
///
/// Returns `None` when the model has no configuration, segmented pricing is
/// disabled for it, or no rule covers the observed token counts. The caller
/// falls back to its base pricing; this path never fails a request.
pub async fn evaluate(
    store: &RatioStore,
    model_name: &str,
    input_tokens: u64,
    output_tokens: u64,
) -> Option<MatchedRatio> {
    let config = store.get(model_name).await?;
    if !config.enabled || config.rules.is_empty() {
        return None;
    }

    // Rules are stored in priority-descending order; the first hit wins.
    config
        .rules
        .iter()
        .find(|rule| matches_rule(rule, input_tokens, output_tokens))
        .map(|rule| MatchedRatio {
            model_ratio: rule.model_ratio,
            completion_ratio: rule.completion_ratio,
        })
}

/// Whether `rule` covers the observed token counts.
///
/// A bound of 0 constrains nothing, even when its exclusivity flag is set.
/// All present bounds must hold; a rule with no bounds matches everything.
pub fn matches_rule(rule: &SegmentRule, input_tokens: u64, output_tokens: u64) -> bool {
    above_min(input_tokens, rule.input_min, rule.input_min_exclusive)
        && below_max(input_tokens, rule.input_max, rule.input_max_exclusive)
        && above_min(output_tokens, rule.output_min, rule.output_min_exclusive)
        && below_max(output_tokens, rule.output_max, rule.output_max_exclusive)
}

fn above_min(value: u64, bound: u64, exclusive: bool) -> bool {
    if bound == 0 {
        return true;
    }
    if exclusive {
        value > bound
    } else {
        value >= bound
    }
}

fn below_max(value: u64, bound: u64, exclusive: bool) -> bool {
    if bound == 0 {
        return true;
    }
    if exclusive {
        value < bound
    } else {
        value <= bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_with_no_bounds_matches_everything() {
        let rule = SegmentRule::default();

        assert!(matches_rule(&rule, 0, 0));
        assert!(matches_rule(&rule, 1, 1));
        assert!(matches_rule(&rule, u64::MAX, u64::MAX));
    }

    #[test]
    fn test_zero_bound_ignores_exclusivity_flag() {
        // an exclusive flag on an absent (0) bound must not exclude anything
        let rule = SegmentRule {
            input_min_exclusive: true,
            output_max_exclusive: true,
            ..Default::default()
        };

        assert!(matches_rule(&rule, 0, 0));
    }

    #[test]
    fn test_min_bound_inclusive_vs_exclusive() {
        let inclusive = SegmentRule {
            input_min: 10,
            ..Default::default()
        };
        assert!(!matches_rule(&inclusive, 9, 0));
        assert!(matches_rule(&inclusive, 10, 0));
        assert!(matches_rule(&inclusive, 11, 0));

        let exclusive = SegmentRule {
            input_min: 10,
            input_min_exclusive: true,
            ..Default::default()
        };
        assert!(!matches_rule(&exclusive, 10, 0));
        assert!(matches_rule(&exclusive, 11, 0));
    }

    #[test]
    fn test_max_bound_inclusive_vs_exclusive() {
        let inclusive = SegmentRule {
            output_max: 100,
            ..Default::default()
        };
        assert!(matches_rule(&inclusive, 0, 100));
        assert!(!matches_rule(&inclusive, 0, 101));

        let exclusive = SegmentRule {
            output_max: 100,
            output_max_exclusive: true,
            ..Default::default()
        };
        assert!(matches_rule(&exclusive, 0, 99));
        assert!(!matches_rule(&exclusive, 0, 100));
    }

    #[test]
    fn test_all_bounds_must_hold() {
        let rule = SegmentRule {
            input_min: 10,
            input_max: 100,
            output_min: 1,
            output_max: 50,
            ..Default::default()
        };

        assert!(matches_rule(&rule, 50, 25));
        assert!(!matches_rule(&rule, 5, 25)); // input below min
        assert!(!matches_rule(&rule, 50, 60)); // output above max
        assert!(!matches_rule(&rule, 101, 25)); // input above max
        assert!(!matches_rule(&rule, 50, 0)); // output below min
    }
}
