// consensus/query.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::math::Dec;
use crate::state::Keeper;
use crate::types::{ScoringError, TopicId};

/// Absence is reported through the flag, never as an error: an unset fraction
/// reads as zero with `not_found` raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousRewardFractionResponse {
    pub reward_fraction: Dec,
    pub not_found: bool,
}

/// Read-only query surface over the keeper.
pub struct QueryServer<K> {
    keeper: Arc<RwLock<K>>,
}

impl<K: Keeper> QueryServer<K> {
    pub fn new(keeper: Arc<RwLock<K>>) -> Self {
        Self { keeper }
    }

    pub async fn get_previous_reputer_reward_fraction(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<PreviousRewardFractionResponse, ScoringError> {
        let keeper = self.keeper.read().await;
        let (reward_fraction, not_found) = keeper
            .get_previous_reputer_reward_fraction(topic_id, reputer)
            .map_err(|e| ScoringError::store("GetPreviousReputerRewardFraction", e))?;
        Ok(PreviousRewardFractionResponse {
            reward_fraction,
            not_found,
        })
    }

    pub async fn get_previous_inference_reward_fraction(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<PreviousRewardFractionResponse, ScoringError> {
        let keeper = self.keeper.read().await;
        let (reward_fraction, not_found) = keeper
            .get_previous_inference_reward_fraction(topic_id, worker)
            .map_err(|e| ScoringError::store("GetPreviousInferenceRewardFraction", e))?;
        Ok(PreviousRewardFractionResponse {
            reward_fraction,
            not_found,
        })
    }

    pub async fn get_previous_forecast_reward_fraction(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<PreviousRewardFractionResponse, ScoringError> {
        let keeper = self.keeper.read().await;
        let (reward_fraction, not_found) = keeper
            .get_previous_forecast_reward_fraction(topic_id, worker)
            .map_err(|e| ScoringError::store("GetPreviousForecastRewardFraction", e))?;
        Ok(PreviousRewardFractionResponse {
            reward_fraction,
            not_found,
        })
    }
}
