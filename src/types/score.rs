// consensus/types/score.rs
use serde::{Deserialize, Serialize};

use super::{BlockHeight, TopicId};
use crate::math::Dec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub topic_id: TopicId,
    pub block_height: BlockHeight,
    pub address: String,
    pub score: Dec,
}

/// Per-(topic, reputer) weighting factor in consensus fitting. Updated every
/// round the reputer participates and carried forward as momentum state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningCoefficient {
    pub coefficient: Dec,
}

impl Default for ListeningCoefficient {
    fn default() -> Self {
        // Neutral weight on first participation.
        Self {
            coefficient: Dec::one(),
        }
    }
}
