// consensus/src/lib.rs
//
// Deterministic consensus scoring for a decentralized inference network.
// Reputers audit worker output and submit loss bundles; the core normalizes
// those bundles, fits a stake-weighted robust consensus over them, and scores
// reputers, inferers, and forecasters for the reward mechanism. Every node
// validating the same block must reproduce these results bit for bit.

pub mod core;
pub mod governance;
pub mod math;
pub mod query;
pub mod server;
pub mod state;
pub mod types;

pub mod prelude {
    pub use crate::core::scoring::{
        ensure_worker_presence, generate_forecast_scores, generate_inference_scores,
        generate_reputer_scores, RoundInput, RoundOutcome, ScoringEngine,
    };
    pub use crate::governance::parameters::Params;
    pub use crate::math::{Dec, MathError};
    pub use crate::query::{PreviousRewardFractionResponse, QueryServer};
    pub use crate::server::EmissionsServer;
    pub use crate::state::{Keeper, MemoryKeeper};
    pub use crate::types::{
        BlockHeight, ListeningCoefficient, Score, ScoringError, StoreError, TopicId, ValueBundle,
        WithheldWorkerAttributedValue, WorkerAttributedValue,
    };
}
