// consensus/core/scoring/forecast.rs
use std::collections::BTreeMap;

use tracing::debug;

use crate::math::{Dec, MathError};
use crate::state::Keeper;
use crate::types::{validate_address, BlockHeight, Score, ScoringError, TopicId, ValueBundle};

/// Weight of the one-in signal: `1 / 2^(n - 1)` for `n` participating
/// forecasters. With more forecasters around, any single forecaster's
/// naive-comparison signal carries less information.
fn unique_aggregation_weight(num_forecasters: u64) -> Result<Dec, MathError> {
    Dec::new(5, 1).powi(num_forecasters.saturating_sub(1))
}

/// Scores each forecaster by combining two marginal signals: the one-out
/// score `combined_value - one_out_loss` and the one-in score
/// `one_in_loss - naive_value`, blended by the unique aggregation weight.
/// The two collections are zipped by worker key, never by position.
pub fn generate_forecast_scores<K: Keeper>(
    keeper: &mut K,
    topic_id: TopicId,
    block: BlockHeight,
    network_losses: &ValueBundle,
) -> Result<Vec<Score>, ScoringError> {
    let mut scores = Vec::new();

    // More than one forecaster is required to have one-out losses. The
    // degenerate zero score belongs to the sole forecaster itself.
    if network_losses.forecaster_values.len() == 1 {
        let sole_forecaster = &network_losses.forecaster_values[0].worker;
        validate_address("forecast scoring", sole_forecaster)?;
        let score = Score {
            topic_id,
            block_height: block,
            address: sole_forecaster.clone(),
            score: Dec::zero(),
        };
        keeper
            .insert_worker_forecast_score(topic_id, block, score.clone())
            .map_err(|e| ScoringError::store("InsertWorkerForecastScore", e))?;
        scores.push(score);
        return Ok(scores);
    }

    let mut one_out_scores: BTreeMap<&str, Dec> = BTreeMap::new();
    for one_out_loss in &network_losses.one_out_forecaster_values {
        let worker_score = network_losses
            .combined_value
            .checked_sub(one_out_loss.value)
            .map_err(|e| ScoringError::arithmetic("forecast one-out score", e))?;
        one_out_scores.insert(one_out_loss.worker.as_str(), worker_score);
    }

    let unique_weight = unique_aggregation_weight(one_out_scores.len() as u64)
        .map_err(|e| ScoringError::arithmetic("unique aggregation weight", e))?;
    let one_out_weight = Dec::one()
        .checked_sub(unique_weight)
        .map_err(|e| ScoringError::arithmetic("unique aggregation weight", e))?;

    for one_in_loss in &network_losses.one_in_forecaster_values {
        validate_address("forecast scoring", &one_in_loss.worker)?;

        let score_one_in = one_in_loss
            .value
            .checked_sub(network_losses.naive_value)
            .map_err(|e| ScoringError::arithmetic("forecast one-in score", e))?;
        let score_one_out = one_out_scores
            .get(one_in_loss.worker.as_str())
            .copied()
            .ok_or_else(|| {
                ScoringError::ShapeMismatch(format!(
                    "forecaster {} has a one-in entry but no one-out entry",
                    one_in_loss.worker
                ))
            })?;

        let final_score = combine_forecast_signals(
            score_one_in,
            score_one_out,
            unique_weight,
            one_out_weight,
        )
        .map_err(|e| ScoringError::arithmetic("forecast score blend", e))?;

        let score = Score {
            topic_id,
            block_height: block,
            address: one_in_loss.worker.clone(),
            score: final_score,
        };
        keeper
            .insert_worker_forecast_score(topic_id, block, score.clone())
            .map_err(|e| ScoringError::store("InsertWorkerForecastScore", e))?;
        keeper
            .set_latest_forecaster_score(topic_id, &one_in_loss.worker, score.clone())
            .map_err(|e| ScoringError::store("SetLatestForecasterScore", e))?;
        scores.push(score);
    }
    debug!(topic_id, block, forecasters = scores.len(), "forecast scores persisted");
    Ok(scores)
}

fn combine_forecast_signals(
    score_one_in: Dec,
    score_one_out: Dec,
    unique_weight: Dec,
    one_out_weight: Dec,
) -> Result<Dec, MathError> {
    unique_weight
        .checked_mul(score_one_in)?
        .checked_add(one_out_weight.checked_mul(score_one_out)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryKeeper;
    use crate::types::{WithheldWorkerAttributedValue, WorkerAttributedValue};
    use rust_decimal_macros::dec;

    fn network_losses(
        combined: i64,
        naive: i64,
        forecasters: &[&str],
        one_out: &[(&str, i64)],
        one_in: &[(&str, i64)],
    ) -> ValueBundle {
        ValueBundle {
            topic_id: 1,
            reputer: String::new(),
            combined_value: Dec::from_int(combined),
            naive_value: Dec::from_int(naive),
            inferer_values: vec![WorkerAttributedValue {
                worker: "inferer1".to_string(),
                value: Dec::from_int(combined),
            }],
            forecaster_values: forecasters
                .iter()
                .map(|w| WorkerAttributedValue {
                    worker: w.to_string(),
                    value: Dec::from_int(combined),
                })
                .collect(),
            one_out_inferer_values: Vec::new(),
            one_out_forecaster_values: one_out
                .iter()
                .map(|(w, v)| WithheldWorkerAttributedValue {
                    worker: w.to_string(),
                    value: Dec::from_int(*v),
                })
                .collect(),
            one_in_forecaster_values: one_in
                .iter()
                .map(|(w, v)| WorkerAttributedValue {
                    worker: w.to_string(),
                    value: Dec::from_int(*v),
                })
                .collect(),
        }
    }

    #[test]
    fn half_powers_discount_growing_populations() {
        assert_eq!(unique_aggregation_weight(1).unwrap(), Dec::one());
        assert_eq!(unique_aggregation_weight(2).unwrap(), Dec::new(5, 1));
        assert_eq!(unique_aggregation_weight(3).unwrap(), Dec::from(dec!(0.25)));
    }

    #[test]
    fn single_forecaster_scores_zero_under_its_own_address() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(100, 100, &["forecaster1"], &[], &[]);

        let scores = generate_forecast_scores(&mut keeper, 1, 10, &losses).unwrap();
        assert_eq!(scores.len(), 1);
        // The degenerate score is attributed to the sole forecaster, not to
        // some unrelated worker, and lands in the forecast store.
        assert_eq!(scores[0].address, "forecaster1");
        assert_eq!(scores[0].score, Dec::zero());
        assert_eq!(keeper.forecast_scores_at_block(1, 10).len(), 1);
        assert!(keeper.inference_scores_at_block(1, 10).is_empty());
    }

    #[test]
    fn blends_one_out_and_one_in_signals() {
        let mut keeper = MemoryKeeper::new();
        // Two forecasters: unique weight is 1/2.
        // forecaster1: one-out = 100 - 90 = 10, one-in = 104 - 100 = 4 -> 7.
        // forecaster2: one-out = 100 - 100 = 0, one-in = 102 - 100 = 2 -> 1.
        let losses = network_losses(
            100,
            100,
            &["forecaster1", "forecaster2"],
            &[("forecaster1", 90), ("forecaster2", 100)],
            &[("forecaster1", 104), ("forecaster2", 102)],
        );

        let scores = generate_forecast_scores(&mut keeper, 1, 10, &losses).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].score, Dec::from_int(7));
        assert_eq!(scores[1].score, Dec::from_int(1));
    }

    #[test]
    fn signals_zip_by_worker_key_not_position() {
        let mut keeper = MemoryKeeper::new();
        // One-out entries arrive in the opposite order of one-in entries;
        // scores must still pair per worker.
        let losses = network_losses(
            100,
            100,
            &["forecaster1", "forecaster2"],
            &[("forecaster2", 100), ("forecaster1", 90)],
            &[("forecaster1", 104), ("forecaster2", 102)],
        );

        let scores = generate_forecast_scores(&mut keeper, 1, 10, &losses).unwrap();
        assert_eq!(scores[0].address, "forecaster1");
        assert_eq!(scores[0].score, Dec::from_int(7));
        assert_eq!(scores[1].address, "forecaster2");
        assert_eq!(scores[1].score, Dec::from_int(1));
    }

    #[test]
    fn missing_one_out_entry_is_a_shape_mismatch() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(
            100,
            100,
            &["forecaster1", "forecaster2"],
            &[("forecaster1", 90)],
            &[("forecaster1", 104), ("forecaster2", 102)],
        );

        let err = generate_forecast_scores(&mut keeper, 1, 10, &losses).unwrap_err();
        assert!(matches!(err, ScoringError::ShapeMismatch(_)));
    }

    #[test]
    fn latest_slot_tracks_the_new_score() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(
            100,
            100,
            &["forecaster1", "forecaster2"],
            &[("forecaster1", 90), ("forecaster2", 100)],
            &[("forecaster1", 104), ("forecaster2", 102)],
        );

        generate_forecast_scores(&mut keeper, 1, 10, &losses).unwrap();
        let latest = keeper
            .get_latest_forecaster_score(1, "forecaster1")
            .unwrap()
            .unwrap();
        assert_eq!(latest.score, Dec::from_int(7));
    }
}
