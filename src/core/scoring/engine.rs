// consensus/core/scoring/engine.rs
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::state::Keeper;
use crate::types::{BlockHeight, Score, ScoringError, TopicId, ValueBundle};

use super::consensus::generate_reputer_scores;
use super::forecast::generate_forecast_scores;
use super::inference::generate_inference_scores;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundInput {
    pub topic_id: TopicId,
    pub block: BlockHeight,
    pub bundles: Vec<ValueBundle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub topic_id: TopicId,
    pub block: BlockHeight,
    pub reputer_scores: Vec<Score>,
    pub inference_scores: Vec<Score>,
    pub forecast_scores: Vec<Score>,
    pub consensus: ValueBundle,
}

/// Round orchestrator. Holds the storage collaborator behind one write lock;
/// a whole round settles under that lock so state writes land as a unit and
/// in one deterministic order.
pub struct ScoringEngine<K> {
    keeper: Arc<RwLock<K>>,
}

impl<K> Clone for ScoringEngine<K> {
    fn clone(&self) -> Self {
        Self {
            keeper: Arc::clone(&self.keeper),
        }
    }
}

impl<K: Keeper> ScoringEngine<K> {
    pub fn new(keeper: Arc<RwLock<K>>) -> Self {
        Self { keeper }
    }

    pub fn keeper(&self) -> Arc<RwLock<K>> {
        Arc::clone(&self.keeper)
    }

    pub async fn generate_reputer_scores(
        &self,
        topic_id: TopicId,
        block: BlockHeight,
        bundles: Vec<ValueBundle>,
    ) -> Result<(Vec<Score>, ValueBundle), ScoringError> {
        let mut keeper = self.keeper.write().await;
        generate_reputer_scores(&mut *keeper, topic_id, block, bundles)
    }

    pub async fn generate_inference_scores(
        &self,
        topic_id: TopicId,
        block: BlockHeight,
        network_losses: &ValueBundle,
    ) -> Result<Vec<Score>, ScoringError> {
        let mut keeper = self.keeper.write().await;
        generate_inference_scores(&mut *keeper, topic_id, block, network_losses)
    }

    pub async fn generate_forecast_scores(
        &self,
        topic_id: TopicId,
        block: BlockHeight,
        network_losses: &ValueBundle,
    ) -> Result<Vec<Score>, ScoringError> {
        let mut keeper = self.keeper.write().await;
        generate_forecast_scores(&mut *keeper, topic_id, block, network_losses)
    }

    /// Settles one topic's round: consensus fitting over the reported
    /// losses, then worker scoring against the produced network bundle. The
    /// inference and forecast passes have no data dependency on each other.
    pub async fn settle_round(&self, round: RoundInput) -> Result<RoundOutcome, ScoringError> {
        let mut keeper = self.keeper.write().await;
        Self::settle_round_locked(&mut keeper, round)
    }

    /// Settles several topics' rounds. Rounds are applied in ascending
    /// (topic, block) order so every node produces the identical write
    /// sequence regardless of how the inputs were gathered.
    pub async fn settle_rounds(
        &self,
        mut rounds: Vec<RoundInput>,
    ) -> Result<Vec<RoundOutcome>, ScoringError> {
        rounds.sort_by_key(|round| (round.topic_id, round.block));
        let mut keeper = self.keeper.write().await;
        rounds
            .into_iter()
            .map(|round| Self::settle_round_locked(&mut keeper, round))
            .collect()
    }

    fn settle_round_locked(keeper: &mut K, round: RoundInput) -> Result<RoundOutcome, ScoringError> {
        let RoundInput {
            topic_id,
            block,
            bundles,
        } = round;
        let (reputer_scores, consensus) =
            generate_reputer_scores(keeper, topic_id, block, bundles)?;
        let inference_scores = generate_inference_scores(keeper, topic_id, block, &consensus)?;
        let forecast_scores = generate_forecast_scores(keeper, topic_id, block, &consensus)?;
        info!(
            topic_id,
            block,
            reputers = reputer_scores.len(),
            inferers = inference_scores.len(),
            forecasters = forecast_scores.len(),
            "round settled"
        );
        Ok(RoundOutcome {
            topic_id,
            block,
            reputer_scores,
            inference_scores,
            forecast_scores,
            consensus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Dec;
    use crate::state::MemoryKeeper;
    use crate::types::{WithheldWorkerAttributedValue, WorkerAttributedValue};

    fn bundle(reputer: &str, combined: i64) -> ValueBundle {
        ValueBundle {
            topic_id: 1,
            reputer: reputer.to_string(),
            combined_value: Dec::from_int(combined),
            naive_value: Dec::from_int(combined),
            inferer_values: vec![
                WorkerAttributedValue {
                    worker: "worker1".to_string(),
                    value: Dec::from_int(combined),
                },
                WorkerAttributedValue {
                    worker: "worker2".to_string(),
                    value: Dec::from_int(combined),
                },
            ],
            forecaster_values: vec![
                WorkerAttributedValue {
                    worker: "forecaster1".to_string(),
                    value: Dec::from_int(combined),
                },
                WorkerAttributedValue {
                    worker: "forecaster2".to_string(),
                    value: Dec::from_int(combined),
                },
            ],
            one_out_inferer_values: vec![
                WithheldWorkerAttributedValue {
                    worker: "worker1".to_string(),
                    value: Dec::from_int(combined),
                },
                WithheldWorkerAttributedValue {
                    worker: "worker2".to_string(),
                    value: Dec::from_int(combined - 10),
                },
            ],
            one_out_forecaster_values: vec![
                WithheldWorkerAttributedValue {
                    worker: "forecaster1".to_string(),
                    value: Dec::from_int(combined),
                },
                WithheldWorkerAttributedValue {
                    worker: "forecaster2".to_string(),
                    value: Dec::from_int(combined - 4),
                },
            ],
            one_in_forecaster_values: vec![
                WorkerAttributedValue {
                    worker: "forecaster1".to_string(),
                    value: Dec::from_int(combined),
                },
                WorkerAttributedValue {
                    worker: "forecaster2".to_string(),
                    value: Dec::from_int(combined + 2),
                },
            ],
        }
    }

    fn engine_with_stake() -> ScoringEngine<MemoryKeeper> {
        let mut keeper = MemoryKeeper::new();
        keeper.set_stake_on_reputer_in_topic(1, "reputer1", Dec::from_int(100));
        keeper.set_stake_on_reputer_in_topic(1, "reputer2", Dec::from_int(100));
        keeper.set_stake_on_reputer_in_topic(2, "reputer1", Dec::from_int(100));
        ScoringEngine::new(Arc::new(RwLock::new(keeper)))
    }

    #[tokio::test]
    async fn settle_round_scores_all_three_roles() {
        let engine = engine_with_stake();
        let outcome = engine
            .settle_round(RoundInput {
                topic_id: 1,
                block: 10,
                bundles: vec![bundle("reputer1", 100), bundle("reputer2", 100)],
            })
            .await
            .unwrap();

        assert_eq!(outcome.reputer_scores.len(), 2);
        assert_eq!(outcome.inference_scores.len(), 2);
        assert_eq!(outcome.forecast_scores.len(), 2);

        // Perfect agreement: identical reports give identical reputer scores.
        assert_eq!(
            outcome.reputer_scores[0].score,
            outcome.reputer_scores[1].score
        );
        // worker1's one-out loss equals the combined loss, so its score is 0;
        // worker2's exclusion would have lowered loss by 10.
        assert_eq!(outcome.inference_scores[0].score, Dec::zero());
        assert_eq!(outcome.inference_scores[1].score, Dec::from_int(10));
    }

    #[tokio::test]
    async fn rounds_settle_in_topic_order() {
        let engine = engine_with_stake();
        let outcomes = engine
            .settle_rounds(vec![
                RoundInput {
                    topic_id: 2,
                    block: 10,
                    bundles: vec![bundle("reputer1", 50)],
                },
                RoundInput {
                    topic_id: 1,
                    block: 10,
                    bundles: vec![bundle("reputer1", 100), bundle("reputer2", 100)],
                },
            ])
            .await
            .unwrap();

        let topics: Vec<TopicId> = outcomes.iter().map(|o| o.topic_id).collect();
        assert_eq!(topics, vec![1, 2]);

        let keeper = engine.keeper();
        let guard = keeper.read().await;
        assert_eq!(guard.reputer_scores_at_block(1, 10).len(), 2);
        assert_eq!(guard.reputer_scores_at_block(2, 10).len(), 1);
    }

    #[tokio::test]
    async fn consensus_bundle_feeds_worker_scoring() {
        let engine = engine_with_stake();
        let (_, consensus) = engine
            .generate_reputer_scores(1, 10, vec![bundle("reputer1", 100), bundle("reputer2", 100)])
            .await
            .unwrap();

        let inference_scores = engine
            .generate_inference_scores(1, 10, &consensus)
            .await
            .unwrap();
        let forecast_scores = engine
            .generate_forecast_scores(1, 10, &consensus)
            .await
            .unwrap();
        assert_eq!(inference_scores.len(), 2);
        assert_eq!(forecast_scores.len(), 2);
    }
}
