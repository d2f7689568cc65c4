// consensus/state/memory.rs
use std::collections::{BTreeMap, BTreeSet};

use crate::governance::parameters::Params;
use crate::math::Dec;
use crate::types::{
    BlockHeight, Forecast, Inference, ListeningCoefficient, Score, StoreError, TopicId,
};

use super::keeper::Keeper;

type ParticipantKey = (TopicId, String);
type RoundKey = (TopicId, BlockHeight);

/// Deterministic in-memory store. Every collection is a BTreeMap so iteration
/// order is reproducible across nodes and runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeeper {
    params: Params,
    stakes: BTreeMap<ParticipantKey, Dec>,
    coefficients: BTreeMap<ParticipantKey, ListeningCoefficient>,

    reputer_score_history: BTreeMap<RoundKey, Vec<Score>>,
    inference_score_history: BTreeMap<RoundKey, Vec<Score>>,
    forecast_score_history: BTreeMap<RoundKey, Vec<Score>>,
    latest_reputer_scores: BTreeMap<ParticipantKey, Score>,
    latest_inferer_scores: BTreeMap<ParticipantKey, Score>,
    latest_forecaster_scores: BTreeMap<ParticipantKey, Score>,

    reputer_reward_fractions: BTreeMap<ParticipantKey, Dec>,
    inference_reward_fractions: BTreeMap<ParticipantKey, Dec>,
    forecast_reward_fractions: BTreeMap<ParticipantKey, Dec>,

    reputer_whitelist: BTreeSet<String>,

    inferences: BTreeMap<RoundKey, Vec<Inference>>,
    forecasts: BTreeMap<RoundKey, Vec<Forecast>>,
}

impl MemoryKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub fn set_stake_on_reputer_in_topic(&mut self, topic_id: TopicId, reputer: &str, stake: Dec) {
        self.stakes.insert((topic_id, reputer.to_string()), stake);
    }

    pub fn insert_inferences(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        inferences: Vec<Inference>,
    ) {
        self.inferences.insert((topic_id, block), inferences);
    }

    pub fn insert_forecasts(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        forecasts: Vec<Forecast>,
    ) {
        self.forecasts.insert((topic_id, block), forecasts);
    }

    pub fn get_inferences(&self, topic_id: TopicId, block: BlockHeight) -> Option<&[Inference]> {
        self.inferences
            .get(&(topic_id, block))
            .map(Vec::as_slice)
    }

    pub fn get_forecasts(&self, topic_id: TopicId, block: BlockHeight) -> Option<&[Forecast]> {
        self.forecasts.get(&(topic_id, block)).map(Vec::as_slice)
    }

    pub fn reputer_scores_at_block(&self, topic_id: TopicId, block: BlockHeight) -> &[Score] {
        self.reputer_score_history
            .get(&(topic_id, block))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn inference_scores_at_block(&self, topic_id: TopicId, block: BlockHeight) -> &[Score] {
        self.inference_score_history
            .get(&(topic_id, block))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn forecast_scores_at_block(&self, topic_id: TopicId, block: BlockHeight) -> &[Score] {
        self.forecast_score_history
            .get(&(topic_id, block))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Keeper for MemoryKeeper {
    fn get_stake_on_reputer_in_topic(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Dec, StoreError> {
        Ok(self
            .stakes
            .get(&(topic_id, reputer.to_string()))
            .copied()
            .unwrap_or_else(Dec::zero))
    }

    fn get_listening_coefficient(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<ListeningCoefficient, StoreError> {
        Ok(self
            .coefficients
            .get(&(topic_id, reputer.to_string()))
            .copied()
            .unwrap_or_default())
    }

    fn set_listening_coefficient(
        &mut self,
        topic_id: TopicId,
        reputer: &str,
        coefficient: ListeningCoefficient,
    ) -> Result<(), StoreError> {
        self.coefficients
            .insert((topic_id, reputer.to_string()), coefficient);
        Ok(())
    }

    fn get_params(&self) -> Result<Params, StoreError> {
        Ok(self.params.clone())
    }

    fn insert_reputer_score(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        score: Score,
    ) -> Result<(), StoreError> {
        self.reputer_score_history
            .entry((topic_id, block))
            .or_default()
            .push(score);
        Ok(())
    }

    fn insert_worker_inference_score(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        score: Score,
    ) -> Result<(), StoreError> {
        self.inference_score_history
            .entry((topic_id, block))
            .or_default()
            .push(score);
        Ok(())
    }

    fn insert_worker_forecast_score(
        &mut self,
        topic_id: TopicId,
        block: BlockHeight,
        score: Score,
    ) -> Result<(), StoreError> {
        self.forecast_score_history
            .entry((topic_id, block))
            .or_default()
            .push(score);
        Ok(())
    }

    fn set_latest_reputer_score(
        &mut self,
        topic_id: TopicId,
        reputer: &str,
        score: Score,
    ) -> Result<(), StoreError> {
        self.latest_reputer_scores
            .insert((topic_id, reputer.to_string()), score);
        Ok(())
    }

    fn set_latest_inferer_score(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        score: Score,
    ) -> Result<(), StoreError> {
        self.latest_inferer_scores
            .insert((topic_id, worker.to_string()), score);
        Ok(())
    }

    fn set_latest_forecaster_score(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        score: Score,
    ) -> Result<(), StoreError> {
        self.latest_forecaster_scores
            .insert((topic_id, worker.to_string()), score);
        Ok(())
    }

    fn get_latest_reputer_score(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<Option<Score>, StoreError> {
        Ok(self
            .latest_reputer_scores
            .get(&(topic_id, reputer.to_string()))
            .cloned())
    }

    fn get_latest_inferer_score(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<Option<Score>, StoreError> {
        Ok(self
            .latest_inferer_scores
            .get(&(topic_id, worker.to_string()))
            .cloned())
    }

    fn get_latest_forecaster_score(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<Option<Score>, StoreError> {
        Ok(self
            .latest_forecaster_scores
            .get(&(topic_id, worker.to_string()))
            .cloned())
    }

    fn get_previous_reputer_reward_fraction(
        &self,
        topic_id: TopicId,
        reputer: &str,
    ) -> Result<(Dec, bool), StoreError> {
        Ok(read_fraction(
            &self.reputer_reward_fractions,
            topic_id,
            reputer,
        ))
    }

    fn set_previous_reputer_reward_fraction(
        &mut self,
        topic_id: TopicId,
        reputer: &str,
        fraction: Dec,
    ) -> Result<(), StoreError> {
        self.reputer_reward_fractions
            .insert((topic_id, reputer.to_string()), fraction);
        Ok(())
    }

    fn get_previous_inference_reward_fraction(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(Dec, bool), StoreError> {
        Ok(read_fraction(
            &self.inference_reward_fractions,
            topic_id,
            worker,
        ))
    }

    fn set_previous_inference_reward_fraction(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        fraction: Dec,
    ) -> Result<(), StoreError> {
        self.inference_reward_fractions
            .insert((topic_id, worker.to_string()), fraction);
        Ok(())
    }

    fn get_previous_forecast_reward_fraction(
        &self,
        topic_id: TopicId,
        worker: &str,
    ) -> Result<(Dec, bool), StoreError> {
        Ok(read_fraction(
            &self.forecast_reward_fractions,
            topic_id,
            worker,
        ))
    }

    fn set_previous_forecast_reward_fraction(
        &mut self,
        topic_id: TopicId,
        worker: &str,
        fraction: Dec,
    ) -> Result<(), StoreError> {
        self.forecast_reward_fractions
            .insert((topic_id, worker.to_string()), fraction);
        Ok(())
    }

    fn is_whitelisted_reputer(&self, reputer: &str) -> Result<bool, StoreError> {
        Ok(self.reputer_whitelist.contains(reputer))
    }

    fn add_to_reputer_whitelist(&mut self, reputer: &str) -> Result<(), StoreError> {
        self.reputer_whitelist.insert(reputer.to_string());
        Ok(())
    }
}

fn read_fraction(
    fractions: &BTreeMap<ParticipantKey, Dec>,
    topic_id: TopicId,
    participant: &str,
) -> (Dec, bool) {
    match fractions.get(&(topic_id, participant.to_string())) {
        Some(fraction) => (*fraction, false),
        None => (Dec::zero(), true),
    }
}
