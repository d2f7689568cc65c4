// consensus/types/mod.rs

pub mod bundle;
pub mod errors;
pub mod score;

pub type TopicId = u64;
pub type BlockHeight = i64;

pub use bundle::{
    validate_address, Forecast, Inference, ValueBundle, WithheldWorkerAttributedValue,
    WorkerAttributedValue,
};
pub use errors::{ScoringError, StoreError};
pub use score::{ListeningCoefficient, Score};
