//! Summary statistics over a set of verification records.
//!
//! Aggregation is a single pass of running sums followed by a finalize
//! step. Records whose AI payload cannot be parsed are left out of every
//! count and sum; the list view keeps them as placeholders instead.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::classifier::classify;
use super::parser::parse_outcome;
use super::types::{
    AccuracyStats, CategoryStats, Classification, ConfidenceBucket, ConfidenceStats, ModelStats,
    SummaryData,
};
use crate::config::PricingConfig;
use crate::storage::VerificationRecord;

/// Lower bound of the high-confidence bucket.
pub const HIGH_CONFIDENCE: f64 = 0.85;

/// Lower bound of the medium-confidence bucket.
pub const MEDIUM_CONFIDENCE: f64 = 0.70;

pub const HIGH_RANGE: &str = "0.85-1.0";
pub const MEDIUM_RANGE: &str = "0.70-0.84";
pub const LOW_RANGE: &str = "0.0-0.69";

#[derive(Debug, Default)]
struct CategorySums {
    count: usize,
    correct: usize,
    confidence: f64,
}

#[derive(Debug, Default)]
struct ModelSums {
    verifications: usize,
    input_tokens: u64,
    output_tokens: u64,
}

/// Running sums for a summary.
#[derive(Debug)]
pub struct SummaryAggregator {
    pricing: PricingConfig,
    total: usize,
    skipped: usize,
    confidence: f64,
    label_confidence: f64,
    overview_confidence: f64,
    correct: usize,
    label_success: usize,
    overview_success: usize,
    high: usize,
    medium: usize,
    low: usize,
    categories: BTreeMap<String, CategorySums>,
    models: BTreeMap<String, ModelSums>,
}

impl SummaryAggregator {
    pub fn new(pricing: &PricingConfig) -> Self {
        Self {
            pricing: *pricing,
            total: 0,
            skipped: 0,
            confidence: 0.0,
            label_confidence: 0.0,
            overview_confidence: 0.0,
            correct: 0,
            label_success: 0,
            overview_success: 0,
            high: 0,
            medium: 0,
            low: 0,
            categories: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }

    /// Fold one record into the sums. Unparsable records are skipped.
    pub fn add(&mut self, record: &VerificationRecord) {
        let outcome = match parse_outcome(&record.ai_response) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Skipping record in summary");
                self.skipped += 1;
                return;
            }
        };

        let overall = outcome.overall_confidence();
        let correct = classify(&outcome) == Classification::Correct;

        self.total += 1;
        self.confidence += overall;
        self.label_confidence += outcome.label_score();
        self.overview_confidence += outcome.overview_score();

        if correct {
            self.correct += 1;
        }
        if outcome.label_matched() {
            self.label_success += 1;
        }
        if outcome.overview_matched() {
            self.overview_success += 1;
        }

        if overall >= HIGH_CONFIDENCE {
            self.high += 1;
        } else if overall >= MEDIUM_CONFIDENCE {
            self.medium += 1;
        } else {
            self.low += 1;
        }

        let category = self
            .categories
            .entry(record.product_category.clone())
            .or_default();
        category.count += 1;
        category.confidence += overall;
        if correct {
            category.correct += 1;
        }

        let model = self
            .models
            .entry(record.ai_response.model.clone())
            .or_default();
        model.verifications += 1;
        model.input_tokens = model.input_tokens.saturating_add(record.ai_response.usage.input_tokens);
        model.output_tokens = model.output_tokens.saturating_add(record.ai_response.usage.output_tokens);
    }

    /// Number of records left out because their payload failed to parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Divide the sums into rates and averages.
    pub fn finish(self) -> SummaryData {
        let total = self.total;

        let category_breakdown = self
            .categories
            .into_iter()
            .map(|(name, sums)| {
                let stats = CategoryStats {
                    count: sums.count,
                    success_rate: percentage(sums.correct, sums.count),
                    avg_confidence: mean(sums.confidence, sums.count),
                };
                (name, stats)
            })
            .collect();

        let pricing = self.pricing;
        let ai_model_usage = self
            .models
            .into_iter()
            .map(|(name, sums)| {
                let divisor = sums.verifications.max(1) as u64;
                let avg_input_tokens = sums.input_tokens / divisor;
                let avg_output_tokens = sums.output_tokens / divisor;
                let stats = ModelStats {
                    verifications: sums.verifications,
                    avg_input_tokens,
                    avg_output_tokens,
                    total_cost: pricing.estimate(avg_input_tokens, avg_output_tokens),
                };
                (name, stats)
            })
            .collect();

        debug!(
            total,
            skipped = self.skipped,
            correct = self.correct,
            "Summary aggregated"
        );

        SummaryData {
            total_verifications: total,
            success_rate: percentage(self.correct, total),
            average_confidence: mean(self.confidence, total),
            category_breakdown,
            ai_model_usage,
            confidence_distribution: ConfidenceStats {
                high: bucket(HIGH_RANGE, self.high, total),
                medium: bucket(MEDIUM_RANGE, self.medium, total),
                low: bucket(LOW_RANGE, self.low, total),
            },
            label_accuracy: AccuracyStats {
                average_confidence: mean(self.label_confidence, total),
                success_rate: percentage(self.label_success, total),
            },
            overview_accuracy: AccuracyStats {
                average_confidence: mean(self.overview_confidence, total),
                success_rate: percentage(self.overview_success, total),
            },
        }
    }
}

/// Aggregate a record set into summary statistics.
pub fn summarize<'a, I>(records: I, pricing: &PricingConfig) -> SummaryData
where
    I: IntoIterator<Item = &'a VerificationRecord>,
{
    let mut aggregator = SummaryAggregator::new(pricing);
    for record in records {
        aggregator.add(record);
    }
    aggregator.finish()
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn bucket(range: &str, count: usize, total: usize) -> ConfidenceBucket {
    ConfidenceBucket {
        range: range.to_string(),
        count,
        percentage: percentage(count, total),
    }
}
