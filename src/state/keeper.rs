// consensus/state/keeper.rs
use crate::governance::parameters::Params;
use crate::math::Dec;
use crate::types::{BlockHeight, ListeningCoefficient, Score, StoreError, TopicId};

/// The storage collaborator the scoring core runs against. Synchronous and
/// always-consistent; the surrounding state machine enforces single-writer
/// access per round and applies all writes of a round atomically.
pub trait Keeper {
    /// Stake bonded by a reputer in a topic. Not-found reads as zero.
    fn get_stake_on_reputer_in_topic(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Dec, StoreError>;

    /// Not-found reads as the default neutral coefficient.
    fn get_listening_coefficient(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<ListeningCoefficient, StoreError>;

    fn set_listening_coefficient(
        &mut self,
        topic_id: TopicId,
        reputer: &str,
        coefficient: ListeningCoefficient,
    ) -> Result<(), StoreError>;

    fn get_params(&self) -> Result<Params, StoreError>;

    fn insert_reputer_score(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        score: Score,
    ) -> Result<(), StoreError>;

    fn insert_worker_inference_score(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        score: Score,
    ) -> Result<(), StoreError>;

    fn insert_worker_forecast_score(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        score: Score,
    ) -> Result<(), StoreError>;

    fn set_latest_reputer_score(
        &mut self,
        topic_id: TopicId,
        reputer: &str,
        score: Score,
    ) -> Result<(), StoreError>;

    fn set_latest_inferer_score(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        score: Score,
    ) -> Result<(), StoreError>;

    fn set_latest_forecaster_score(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        score: Score,
    ) -> Result<(), StoreError>;

    fn get_latest_reputer_score(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Option<Score>, StoreError>;

    fn get_latest_inferer_score(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<Option<Score>, StoreError>;

    fn get_latest_forecaster_score(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<Option<Score>, StoreError>;

    /// Returns `(fraction, not_found)`: absence is a sentinel flag alongside
    /// a zero value, never a distinct error.
    fn get_previous_reputer_reward_fraction(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<(Dec, bool), StoreError>;

    fn set_previous_reputer_reward_fraction(
        &mut self,
        topic_id: TopicId,
        reputer: &str,
        fraction: Dec,
    ) -> Result<(), StoreError>;

    fn get_previous_inference_reward_fraction(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(Dec, bool), StoreError>;

    fn set_previous_inference_reward_fraction(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        fraction: Dec,
    ) -> Result<(), StoreError>;

    fn get_previous_forecast_reward_fraction(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(Dec, bool), StoreError>;

    fn set_previous_forecast_reward_fraction(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        fraction: Dec,
    ) -> Result<(), StoreError>;

    fn is_whitelisted_reputer(&self, reputer: &str) -> Result<bool, StoreError>;

    fn add_to_reputer_whitelist(&mut self, reputer: &str) -> Result<(), StoreError>;
}
