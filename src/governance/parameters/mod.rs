// consensus/governance/parameters/mod.rs
use serde::{Deserialize, Serialize};

use crate::math::Dec;

/// Module parameters for the consensus fitting procedure. The iteration cap
/// bounds total work deterministically so a round always fits the block's
/// execution budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub learning_rate: Dec,
    pub gradient_descent_max_iters: u64,
    /// Regularizer in the reputer score denominator, and the convergence
    /// floor for the mean fitting distance.
    pub epsilon: Dec,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            learning_rate: Dec::new(5, 2),
            gradient_descent_max_iters: 10,
            epsilon: Dec::new(1, 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_well_formed() {
        let params = Params::default();
        assert!(!params.learning_rate.is_nan());
        assert!(!params.learning_rate.is_zero());
        assert!(!params.epsilon.is_zero());
        assert!(params.gradient_descent_max_iters > 0);
    }
}
