// consensus/core/scoring/mod.rs

pub mod consensus;
pub mod engine;
pub mod forecast;
pub mod inference;
pub mod normalizer;

pub use consensus::generate_reputer_scores;
pub use engine::{RoundInput, RoundOutcome, ScoringEngine};
pub use forecast::generate_forecast_scores;
pub use inference::generate_inference_scores;
pub use normalizer::ensure_worker_presence;
