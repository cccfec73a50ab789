use super::types::{Classification, VerificationOutcome};

/// Minimum overall confidence for a double "yes" to count as CORRECT.
pub const CORRECT_THRESHOLD: f64 = 0.85;

/// Overall confidence below which a record is INCORRECT.
pub const INCORRECT_THRESHOLD: f64 = 0.60;

/// Classify a parsed outcome.
pub fn classify(outcome: &VerificationOutcome) -> Classification {
    classify_scores(
        outcome.label_matched(),
        outcome.overview_matched(),
        outcome.overall_confidence(),
    )
}

/// Classification rule over the raw inputs.
pub fn classify_scores(label_match: bool, overview_match: bool, overall: f64) -> Classification {
    if label_match && overview_match && overall >= CORRECT_THRESHOLD {
        Classification::Correct
    } else if overall < INCORRECT_THRESHOLD {
        Classification::Incorrect
    } else {
        Classification::Uncertain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::types::Verdict;

    fn outcome(label: &str, overview: &str, label_conf: f64, overview_conf: f64) -> VerificationOutcome {
        VerificationOutcome {
            label_verdict: Some(Verdict::from_raw(label)),
            label_confidence: Some(label_conf),
            overview_verdict: Some(Verdict::from_raw(overview)),
            overview_confidence: Some(overview_conf),
            ..Default::default()
        }
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            ("yes", "yes", 0.90, Classification::Correct),
            ("yes", "yes", 0.80, Classification::Uncertain),
            ("no", "yes", 0.95, Classification::Uncertain),
            ("no", "no", 0.50, Classification::Incorrect),
        ];

        for (label, overview, confidence, expected) in cases {
            assert_eq!(
                classify(&outcome(label, overview, confidence, confidence)),
                expected,
                "{}/{} at {}",
                label,
                overview,
                confidence
            );
        }
    }

    #[test]
    fn test_correct_boundary_is_inclusive() {
        assert_eq!(
            classify(&outcome("yes", "yes", 0.85, 0.85)),
            Classification::Correct
        );
    }

    #[test]
    fn test_incorrect_boundary_is_exclusive() {
        assert_eq!(
            classify(&outcome("no", "no", 0.60, 0.60)),
            Classification::Uncertain
        );
        assert_eq!(
            classify_scores(false, false, 0.5999),
            Classification::Incorrect
        );
    }

    #[test]
    fn test_low_confidence_double_yes_is_incorrect() {
        assert_eq!(
            classify(&outcome("yes", "yes", 0.30, 0.40)),
            Classification::Incorrect
        );
    }

    #[test]
    fn test_overall_confidence_is_the_mean() {
        // 0.95 and 0.70 average to 0.825: below the CORRECT threshold.
        assert_eq!(
            classify(&outcome("yes", "yes", 0.95, 0.70)),
            Classification::Uncertain
        );
    }

    #[test]
    fn test_empty_outcome_is_incorrect() {
        assert_eq!(
            classify(&VerificationOutcome::default()),
            Classification::Incorrect
        );
    }
}
