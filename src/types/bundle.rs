// consensus/types/bundle.rs
use serde::{Deserialize, Serialize};

use super::errors::ScoringError;
use super::TopicId;
use crate::math::Dec;

const MAX_ADDRESS_LEN: usize = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAttributedValue {
    pub worker: String,
    pub value: Dec,
}

/// Loss reported as if the named worker had been withheld from the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithheldWorkerAttributedValue {
    pub worker: String,
    pub value: Dec,
}

/// One reputer's full loss report for a round. The distinguished network
/// bundle produced by consensus fitting uses the same shape with an empty
/// `reputer` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBundle {
    pub topic_id: TopicId,
    pub reputer: String,
    pub combined_value: Dec,
    pub naive_value: Dec,
    pub inferer_values: Vec<WorkerAttributedValue>,
    pub forecaster_values: Vec<WorkerAttributedValue>,
    pub one_out_inferer_values: Vec<WithheldWorkerAttributedValue>,
    pub one_out_forecaster_values: Vec<WithheldWorkerAttributedValue>,
    pub one_in_forecaster_values: Vec<WorkerAttributedValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inference {
    pub topic_id: TopicId,
    pub inferer: String,
    pub value: Dec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    pub topic_id: TopicId,
    pub forecaster: String,
}

/// Participant identities are opaque comparable strings: non-empty, bounded,
/// lowercase alphanumeric. Anything else is a malformed address and aborts
/// the batch it appears in.
pub fn validate_address(context: &'static str, address: &str) -> Result<(), ScoringError> {
    let well_formed = !address.is_empty()
        && address.len() <= MAX_ADDRESS_LEN
        && address
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        Err(ScoringError::InvalidAddress {
            context,
            address: address.to_string(),
        })
    }
}
