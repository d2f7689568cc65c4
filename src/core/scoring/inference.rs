// consensus/core/scoring/inference.rs
use tracing::debug;

use crate::math::Dec;
use crate::state::Keeper;
use crate::types::{validate_address, BlockHeight, Score, ScoringError, TopicId, ValueBundle};

/// Scores each inferer by the marginal effect of excluding it from the
/// network: `combined_value - one_out_loss`. A larger score means the network
/// loss would have risen more without the worker.
pub fn generate_inference_scores<K: Keeper>(
    keeper: &mut K,
    topic_id: TopicId,
    block: BlockHeight,
    network_losses: &ValueBundle,
) -> Result<Vec<Score>, ScoringError> {
    let mut scores = Vec::new();

    // More than one inferer is required to have one-out losses.
    if network_losses.inferer_values.len() == 1 {
        let sole_inferer = &network_losses.inferer_values[0].worker;
        validate_address("inference scoring", sole_inferer)?;
        let score = Score {
            topic_id,
            block_height: block,
            address: sole_inferer.clone(),
            score: Dec::zero(),
        };
        keeper
            .insert_worker_inference_score(topic_id, block, score.clone())
            .map_err(|e| ScoringError::store("InsertWorkerInferenceScore", e))?;
        scores.push(score);
        return Ok(scores);
    }

    for one_out_loss in &network_losses.one_out_inferer_values {
        validate_address("inference scoring", &one_out_loss.worker)?;

        let worker_score = network_losses
            .combined_value
            .checked_sub(one_out_loss.value)
            .map_err(|e| ScoringError::arithmetic("inference one-out score", e))?;

        let score = Score {
            topic_id,
            block_height: block,
            address: one_out_loss.worker.clone(),
            score: worker_score,
        };
        keeper
            .insert_worker_inference_score(topic_id, block, score.clone())
            .map_err(|e| ScoringError::store("InsertWorkerInferenceScore", e))?;
        keeper
            .set_latest_inferer_score(topic_id, &one_out_loss.worker, score.clone())
            .map_err(|e| ScoringError::store("SetLatestInfererScore", e))?;
        scores.push(score);
    }
    debug!(topic_id, block, inferers = scores.len(), "inference scores persisted");
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryKeeper;
    use crate::types::{WithheldWorkerAttributedValue, WorkerAttributedValue};

    fn network_losses(
        combined: i64,
        inferers: &[&str],
        one_out: &[(&str, i64)],
    ) -> ValueBundle {
        ValueBundle {
            topic_id: 1,
            reputer: String::new(),
            combined_value: Dec::from_int(combined),
            naive_value: Dec::from_int(combined),
            inferer_values: inferers
                .iter()
                .map(|w| WorkerAttributedValue {
                    worker: w.to_string(),
                    value: Dec::from_int(combined),
                })
                .collect(),
            forecaster_values: Vec::new(),
            one_out_inferer_values: one_out
                .iter()
                .map(|(w, v)| WithheldWorkerAttributedValue {
                    worker: w.to_string(),
                    value: Dec::from_int(*v),
                })
                .collect(),
            one_out_forecaster_values: Vec::new(),
            one_in_forecaster_values: Vec::new(),
        }
    }

    #[test]
    fn single_inferer_scores_exactly_zero() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(100, &["worker1"], &[]);

        let scores = generate_inference_scores(&mut keeper, 1, 10, &losses).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].address, "worker1");
        assert_eq!(scores[0].score, Dec::zero());
        assert_eq!(keeper.inference_scores_at_block(1, 10).len(), 1);
    }

    #[test]
    fn score_is_combined_minus_one_out_loss() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(
            100,
            &["worker1", "worker2"],
            &[("worker1", 100), ("worker2", 90)],
        );

        let scores = generate_inference_scores(&mut keeper, 1, 10, &losses).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].score, Dec::zero());
        assert_eq!(scores[1].score, Dec::from_int(10));
    }

    #[test]
    fn latest_slot_tracks_the_new_score() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(
            100,
            &["worker1", "worker2"],
            &[("worker1", 98), ("worker2", 90)],
        );

        generate_inference_scores(&mut keeper, 1, 10, &losses).unwrap();
        let latest = keeper
            .get_latest_inferer_score(1, "worker1")
            .unwrap()
            .unwrap();
        assert_eq!(latest.score, Dec::from_int(2));
        assert_eq!(latest.block_height, 10);
    }

    #[test]
    fn malformed_worker_address_fails_the_whole_call() {
        let mut keeper = MemoryKeeper::new();
        let losses = network_losses(
            100,
            &["worker1", "worker2"],
            &[("worker1", 100), ("Bad Worker!", 90)],
        );

        let err = generate_inference_scores(&mut keeper, 1, 10, &losses).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidAddress { .. }));
    }

    #[test]
    fn nan_one_out_loss_propagates_into_the_score() {
        let mut keeper = MemoryKeeper::new();
        let mut losses = network_losses(
            100,
            &["worker1", "worker2"],
            &[("worker1", 100), ("worker2", 90)],
        );
        losses.one_out_inferer_values[1].value = Dec::nan();

        let scores = generate_inference_scores(&mut keeper, 1, 10, &losses).unwrap();
        assert!(scores[1].score.is_nan());
    }
}
