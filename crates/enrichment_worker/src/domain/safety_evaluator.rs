use common::domain::{EnrichedMetric, NormalizedReading, RuleDefinition};

/// A value violates `[from, to]` when it falls strictly outside it; both bounds are inclusive.
pub fn violates(value: f64, from: f64, to: f64) -> bool {
    value < from || value > to
}

/// First rule whose name equals `metric_name`, in list order
pub fn find_rule<'a>(rules: &'a [RuleDefinition], metric_name: &str) -> Option<&'a RuleDefinition> {
    rules.iter().find(|rule| rule.rule_name == metric_name)
}

/// Attach the matching rule's bounds to a reading and flag violations.
/// Readings without a matching rule, or whose rule lacks a bound, are never flagged.
pub fn evaluate(reading: &NormalizedReading, rules: &[RuleDefinition]) -> EnrichedMetric {
    let rule = find_rule(rules, &reading.metric_name);
    let from = rule.and_then(|r| r.from);
    let to = rule.and_then(|r| r.to);

    let violates_safety = match (from, to) {
        (Some(from), Some(to)) => violates(reading.value, from, to),
        _ => false,
    };

    EnrichedMetric {
        metric_name: reading.metric_name.clone(),
        value: reading.value,
        from,
        to,
        violates_safety,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, from: f64, to: f64) -> RuleDefinition {
        RuleDefinition {
            rule_name: name.to_string(),
            from: Some(from),
            to: Some(to),
        }
    }

    fn reading(name: &str, value: f64) -> NormalizedReading {
        NormalizedReading {
            metric_name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(!violates(15.0, 15.0, 30.0));
        assert!(!violates(30.0, 15.0, 30.0));
        assert!(!violates(22.5, 15.0, 30.0));
        assert!(violates(14.999, 15.0, 30.0));
        assert!(violates(30.001, 15.0, 30.0));
    }

    #[test]
    fn test_violation_matches_definition_over_a_grid() {
        let bounds = [(-10.0, 10.0), (0.0, 0.0), (900.0, 1100.0)];
        let values = [-11.0, -10.0, 0.0, 5.5, 10.0, 899.9, 1100.0, 1100.1];

        for (from, to) in bounds {
            for value in values {
                assert_eq!(violates(value, from, to), value < from || value > to);
            }
        }
    }

    #[test]
    fn test_out_of_range_reading_is_flagged() {
        let metric = evaluate(&reading("temperature", 35.0), &[rule("temperature", 15.0, 30.0)]);

        assert!(metric.violates_safety);
        assert_eq!(metric.from, Some(15.0));
        assert_eq!(metric.to, Some(30.0));
    }

    #[test]
    fn test_unmatched_metric_has_no_bounds() {
        let metric = evaluate(
            &reading("pressure", 1013.25),
            &[rule("temperature", 15.0, 30.0)],
        );

        assert_eq!(metric.from, None);
        assert_eq!(metric.to, None);
        assert!(!metric.violates_safety);
    }

    #[test]
    fn test_rule_with_missing_bound_never_flags() {
        let open_below = RuleDefinition {
            rule_name: "humidity".to_string(),
            from: None,
            to: Some(70.0),
        };

        let metric = evaluate(&reading("humidity", 95.0), &[open_below]);

        assert_eq!(metric.from, None);
        assert_eq!(metric.to, Some(70.0));
        assert!(!metric.violates_safety);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = [
            rule("temperature", 15.0, 30.0),
            rule("temperature", 40.0, 50.0),
        ];

        let metric = evaluate(&reading("temperature", 20.0), &rules);

        assert_eq!(metric.from, Some(15.0));
        assert!(!metric.violates_safety);
    }
}
