// consensus/server.rs
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::core::scoring::{RoundInput, RoundOutcome, ScoringEngine};
use crate::state::Keeper;
use crate::types::{validate_address, ScoringError};

/// Submission boundary for reputer loss payloads. Authorization here is
/// limited to the whitelist gate; signature verification belongs to the
/// surrounding transaction layer.
pub struct EmissionsServer<K> {
    keeper: Arc<RwLock<K>>,
    engine: ScoringEngine<K>,
}

impl<K: Keeper> EmissionsServer<K> {
    pub fn new(keeper: Arc<RwLock<K>>) -> Self {
        let engine = ScoringEngine::new(Arc::clone(&keeper));
        Self { keeper, engine }
    }

    pub fn engine(&self) -> &ScoringEngine<K> {
        &self.engine
    }

    pub async fn insert_reputer_payload(
        &self,
        sender: &str,
        round: RoundInput,
    ) -> Result<RoundOutcome, ScoringError> {
        validate_address("reputer payload sender", sender)?;
        {
            let keeper = self.keeper.read().await;
            let whitelisted = keeper
                .is_whitelisted_reputer(sender)
                .map_err(|e| ScoringError::store("IsWhitelistedReputer", e))?;
            if !whitelisted {
                warn!(sender, topic_id = round.topic_id, "rejected unwhitelisted reputer payload");
                return Err(ScoringError::NotInReputerWhitelist(sender.to_string()));
            }
        }
        if round.bundles.is_empty() {
            return Err(ScoringError::EmptyPayload("reputer value bundles"));
        }
        self.engine.settle_round(round).await
    }
}
