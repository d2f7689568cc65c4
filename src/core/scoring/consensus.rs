// consensus/core/scoring/consensus.rs
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::debug;

use crate::governance::parameters::Params;
use crate::math::{Dec, MathError};
use crate::state::Keeper;
use crate::types::{
    validate_address, BlockHeight, ListeningCoefficient, Score, ScoringError, TopicId,
    ValueBundle, WithheldWorkerAttributedValue, WorkerAttributedValue,
};

use super::normalizer::ensure_worker_presence;

/// Canonical column layout shared by every reputer's loss row in a round:
/// combined, naive, then each keyed category in sorted worker order. Rows are
/// extracted by worker key, never by submission position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BundleLayout {
    inferers: Vec<String>,
    forecasters: Vec<String>,
    one_out_inferers: Vec<String>,
    one_out_forecasters: Vec<String>,
    one_in_forecasters: Vec<String>,
}

impl BundleLayout {
    pub(crate) fn from_bundles(bundles: &[ValueBundle]) -> Self {
        let mut inferers = BTreeSet::new();
        let mut forecasters = BTreeSet::new();
        let mut one_out_inferers = BTreeSet::new();
        let mut one_out_forecasters = BTreeSet::new();
        let mut one_in_forecasters = BTreeSet::new();

        for bundle in bundles {
            inferers.extend(bundle.inferer_values.iter().map(|v| v.worker.clone()));
            forecasters.extend(bundle.forecaster_values.iter().map(|v| v.worker.clone()));
            one_out_inferers.extend(
                bundle
                    .one_out_inferer_values
                    .iter()
                    .map(|v| v.worker.clone()),
            );
            one_out_forecasters.extend(
                bundle
                    .one_out_forecaster_values
                    .iter()
                    .map(|v| v.worker.clone()),
            );
            one_in_forecasters.extend(
                bundle
                    .one_in_forecaster_values
                    .iter()
                    .map(|v| v.worker.clone()),
            );
        }

        Self {
            inferers: inferers.into_iter().collect(),
            forecasters: forecasters.into_iter().collect(),
            one_out_inferers: one_out_inferers.into_iter().collect(),
            one_out_forecasters: one_out_forecasters.into_iter().collect(),
            one_in_forecasters: one_in_forecasters.into_iter().collect(),
        }
    }

    /// Flattens a bundle into its loss row. Inferer/forecaster categories are
    /// reputer-specific opinions and NaN-fill silently; the three categories
    /// the normalizer pads must be structurally complete by the time fitting
    /// runs, so a hole there is a shape violation.
    pub(crate) fn extract_row(&self, bundle: &ValueBundle) -> Result<Vec<Dec>, ScoringError> {
        let inferer_values = index_attributed(&bundle.inferer_values);
        let forecaster_values = index_attributed(&bundle.forecaster_values);
        let one_out_inferer_values = index_withheld(&bundle.one_out_inferer_values);
        let one_out_forecaster_values = index_withheld(&bundle.one_out_forecaster_values);
        let one_in_forecaster_values = index_attributed(&bundle.one_in_forecaster_values);

        let mut row = Vec::with_capacity(self.columns());
        row.push(bundle.combined_value);
        row.push(bundle.naive_value);
        for worker in &self.inferers {
            row.push(
                inferer_values
                    .get(worker.as_str())
                    .copied()
                    .unwrap_or_else(Dec::nan),
            );
        }
        for worker in &self.forecasters {
            row.push(
                forecaster_values
                    .get(worker.as_str())
                    .copied()
                    .unwrap_or_else(Dec::nan),
            );
        }
        for worker in &self.one_out_inferers {
            row.push(require_entry(&one_out_inferer_values, worker, "one-out inferer")?);
        }
        for worker in &self.one_out_forecasters {
            row.push(require_entry(
                &one_out_forecaster_values,
                worker,
                "one-out forecaster",
            )?);
        }
        for worker in &self.one_in_forecasters {
            row.push(require_entry(
                &one_in_forecaster_values,
                worker,
                "one-in forecaster",
            )?);
        }
        Ok(row)
    }

    pub(crate) fn columns(&self) -> usize {
        2 + self.inferers.len()
            + self.forecasters.len()
            + self.one_out_inferers.len()
            + self.one_out_forecasters.len()
            + self.one_in_forecasters.len()
    }

    /// Rebuilds the network-owned consensus bundle from a converged column
    /// vector. Attributed to no single reputer.
    pub(crate) fn consensus_bundle(&self, topic_id: TopicId, values: &[Dec]) -> ValueBundle {
        let mut columns = values.iter().copied();
        let combined_value = columns.next().unwrap_or_else(Dec::nan);
        let naive_value = columns.next().unwrap_or_else(Dec::nan);

        let mut take_attributed = |workers: &[String]| -> Vec<WorkerAttributedValue> {
            workers
                .iter()
                .map(|worker| WorkerAttributedValue {
                    worker: worker.clone(),
                    value: columns.next().unwrap_or_else(Dec::nan),
                })
                .collect()
        };
        let inferer_values = take_attributed(&self.inferers);
        let forecaster_values = take_attributed(&self.forecasters);

        let mut take_withheld = |workers: &[String]| -> Vec<WithheldWorkerAttributedValue> {
            workers
                .iter()
                .map(|worker| WithheldWorkerAttributedValue {
                    worker: worker.clone(),
                    value: columns.next().unwrap_or_else(Dec::nan),
                })
                .collect()
        };
        let one_out_inferer_values = take_withheld(&self.one_out_inferers);
        let one_out_forecaster_values = take_withheld(&self.one_out_forecasters);

        let one_in_forecaster_values = self
            .one_in_forecasters
            .iter()
            .map(|worker| WorkerAttributedValue {
                worker: worker.clone(),
                value: columns.next().unwrap_or_else(Dec::nan),
            })
            .collect();

        ValueBundle {
            topic_id,
            reputer: String::new(),
            combined_value,
            naive_value,
            inferer_values,
            forecaster_values,
            one_out_inferer_values,
            one_out_forecaster_values,
            one_in_forecaster_values,
        }
    }
}

fn index_attributed(values: &[WorkerAttributedValue]) -> BTreeMap<&str, Dec> {
    values.iter().map(|v| (v.worker.as_str(), v.value)).collect()
}

fn index_withheld(values: &[WithheldWorkerAttributedValue]) -> BTreeMap<&str, Dec> {
    values.iter().map(|v| (v.worker.as_str(), v.value)).collect()
}

fn require_entry(
    values: &BTreeMap<&str, Dec>,
    worker: &str,
    category: &str,
) -> Result<Dec, ScoringError> {
    values.get(worker).copied().ok_or_else(|| {
        ScoringError::ShapeMismatch(format!(
            "missing {category} entry for worker {worker}; bundles were not normalized"
        ))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FitOutcome {
    pub scores: Vec<Dec>,
    pub coefficients: Vec<Dec>,
    pub consensus: Vec<Dec>,
}

/// Iterative stake-weighted consensus fit.
///
/// Each iteration recomputes the consensus column vector as the
/// (stake x coefficient)-weighted average of all rows, then moves every
/// reputer's listening coefficient toward agreement: reputers closer to the
/// consensus than the weighted mean distance gain weight, outliers lose it.
/// Iterations are strictly sequential; only the per-reputer distance map is
/// parallelized, with an order-preserving collect.
pub(crate) fn fit_consensus(
    losses: &[Vec<Dec>],
    stakes: &[Dec],
    prior_coefficients: &[Dec],
    params: &Params,
) -> Result<FitOutcome, ScoringError> {
    let arith = |source| ScoringError::arithmetic("consensus fit", source);

    let columns = losses.first().map(Vec::len).unwrap_or(0);
    for row in losses {
        if row.len() != columns {
            return Err(ScoringError::ShapeMismatch(format!(
                "loss row has {} columns, expected {columns}",
                row.len()
            )));
        }
    }

    let zero = Dec::zero();
    let one = Dec::one();
    let mut coefficients: Vec<Dec> = prior_coefficients
        .iter()
        .map(|c| c.clamp(zero, one))
        .collect();

    let mut weights = row_weights(stakes, &coefficients).map_err(arith)?;
    if total(&weights).map_err(arith)?.is_zero() {
        // No stake-weighted voice at all; averaging would divide by zero.
        return Err(arith(MathError::ZeroDenominator));
    }

    let mut consensus = consensus_columns(losses, &weights, columns).map_err(arith)?;
    let mut distances = row_distances(losses, &consensus).map_err(arith)?;

    let mut iterations = 0u64;
    for _ in 0..params.gradient_descent_max_iters {
        let mean_distance = weighted_mean_distance(&distances, &weights).map_err(arith)?;
        if mean_distance.is_nan() || mean_distance <= params.epsilon {
            break;
        }

        for i in 0..coefficients.len() {
            let distance = distances[i];
            if distance.is_nan() {
                continue;
            }
            let ratio = distance.checked_div(mean_distance).map_err(arith)?;
            let step = params
                .learning_rate
                .checked_mul(one.checked_sub(ratio).map_err(arith)?)
                .map_err(arith)?;
            coefficients[i] = coefficients[i]
                .checked_add(step)
                .map_err(arith)?
                .clamp(zero, one);
        }

        weights = row_weights(stakes, &coefficients).map_err(arith)?;
        consensus = consensus_columns(losses, &weights, columns).map_err(arith)?;
        distances = row_distances(losses, &consensus).map_err(arith)?;
        iterations += 1;
    }
    debug!(iterations, reputers = losses.len(), columns, "consensus fit finished");

    let mut scores = Vec::with_capacity(losses.len());
    for i in 0..losses.len() {
        scores.push(fit_score(stakes[i], distances[i], params.epsilon).map_err(arith)?);
    }

    Ok(FitOutcome {
        scores,
        coefficients,
        consensus,
    })
}

fn row_weights(stakes: &[Dec], coefficients: &[Dec]) -> Result<Vec<Dec>, MathError> {
    stakes
        .iter()
        .zip(coefficients)
        .map(|(stake, coefficient)| stake.checked_mul(*coefficient))
        .collect()
}

fn total(values: &[Dec]) -> Result<Dec, MathError> {
    let mut sum = Dec::zero();
    for value in values {
        if value.is_nan() {
            continue;
        }
        sum = sum.checked_add(*value)?;
    }
    Ok(sum)
}

/// Weighted average per column over the rows holding an opinion there. A
/// column nobody weighs in on stays NaN.
fn consensus_columns(
    losses: &[Vec<Dec>],
    weights: &[Dec],
    columns: usize,
) -> Result<Vec<Dec>, MathError> {
    let mut consensus = Vec::with_capacity(columns);
    for column in 0..columns {
        let mut numerator = Dec::zero();
        let mut denominator = Dec::zero();
        for (row, weight) in losses.iter().zip(weights) {
            let loss = row[column];
            if loss.is_nan() || weight.is_nan() {
                continue;
            }
            numerator = numerator.checked_add(weight.checked_mul(loss)?)?;
            denominator = denominator.checked_add(*weight)?;
        }
        if denominator.is_zero() {
            consensus.push(Dec::nan());
        } else {
            consensus.push(numerator.checked_div(denominator)?);
        }
    }
    Ok(consensus)
}

fn row_distances(losses: &[Vec<Dec>], consensus: &[Dec]) -> Result<Vec<Dec>, MathError> {
    losses
        .par_iter()
        .map(|row| row_distance(row, consensus))
        .collect()
}

/// Mean absolute deviation of a row from the consensus over the columns both
/// sides have an opinion on. A reputer with no comparable column has no
/// measurable distance and reads NaN.
fn row_distance(row: &[Dec], consensus: &[Dec]) -> Result<Dec, MathError> {
    let mut sum = Dec::zero();
    let mut compared = 0i64;
    for (loss, estimate) in row.iter().zip(consensus) {
        if loss.is_nan() || estimate.is_nan() {
            continue;
        }
        sum = sum.checked_add(loss.checked_sub(*estimate)?.abs())?;
        compared += 1;
    }
    if compared == 0 {
        return Ok(Dec::nan());
    }
    sum.checked_div(Dec::from_int(compared))
}

fn weighted_mean_distance(distances: &[Dec], weights: &[Dec]) -> Result<Dec, MathError> {
    let mut numerator = Dec::zero();
    let mut denominator = Dec::zero();
    for (distance, weight) in distances.iter().zip(weights) {
        if distance.is_nan() || weight.is_nan() {
            continue;
        }
        numerator = numerator.checked_add(weight.checked_mul(*distance)?)?;
        denominator = denominator.checked_add(*weight)?;
    }
    if denominator.is_zero() {
        return Ok(Dec::nan());
    }
    numerator.checked_div(denominator)
}

/// Fit quality scaled by stake: closer rows score higher, zero stake or an
/// unmeasurable row scores the minimal zero.
fn fit_score(stake: Dec, distance: Dec, epsilon: Dec) -> Result<Dec, MathError> {
    if distance.is_nan() || stake.is_zero() {
        return Ok(Dec::zero());
    }
    stake.checked_div(epsilon.checked_add(distance)?)
}

/// Computes consensus and per-reputer fit scores for one round, persists the
/// updated listening coefficients and scores, and returns the scores together
/// with the round's canonical network loss bundle.
pub fn generate_reputer_scores<K: Keeper>(
    keeper: &mut K,
    topic_id: TopicId,
    block: BlockHeight,
    mut bundles: Vec<ValueBundle>,
) -> Result<(Vec<Score>, ValueBundle), ScoringError> {
    if bundles.is_empty() {
        return Err(ScoringError::EmptyPayload("reputer value bundles"));
    }

    ensure_worker_presence(&mut bundles);
    let layout = BundleLayout::from_bundles(&bundles);

    let mut reputers = Vec::with_capacity(bundles.len());
    let mut stakes = Vec::with_capacity(bundles.len());
    let mut coefficients = Vec::with_capacity(bundles.len());
    let mut losses = Vec::with_capacity(bundles.len());
    for bundle in &bundles {
        validate_address("reputer value bundle", &bundle.reputer)?;

        let stake = keeper
            .get_stake_on_reputer_in_topic(topic_id, &bundle.reputer)
            .map_err(|e| ScoringError::store("GetStakeOnReputerInTopic", e))?;
        let coefficient = keeper
            .get_listening_coefficient(topic_id, &bundle.reputer)
            .map_err(|e| ScoringError::store("GetListeningCoefficient", e))?;

        reputers.push(bundle.reputer.clone());
        stakes.push(stake);
        coefficients.push(coefficient.coefficient);
        losses.push(layout.extract_row(bundle)?);
    }

    let params = keeper
        .get_params()
        .map_err(|e| ScoringError::store("GetParams", e))?;

    let outcome = fit_consensus(&losses, &stakes, &coefficients, &params)?;

    let mut scores = Vec::with_capacity(reputers.len());
    for (i, reputer) in reputers.iter().enumerate() {
        keeper
            .set_listening_coefficient(
                topic_id,
                reputer,
                ListeningCoefficient {
                    coefficient: outcome.coefficients[i],
                },
            )
            .map_err(|e| ScoringError::store("SetListeningCoefficient", e))?;

        let score = Score {
            topic_id,
            block_height: block,
            address: reputer.clone(),
            score: outcome.scores[i],
        };
        keeper
            .insert_reputer_score(topic_id, block, score.clone())
            .map_err(|e| ScoringError::store("InsertReputerScore", e))?;
        keeper
            .set_latest_reputer_score(topic_id, reputer, score.clone())
            .map_err(|e| ScoringError::store("SetLatestReputerScore", e))?;
        scores.push(score);
    }
    debug!(topic_id, block, reputers = scores.len(), "reputer scores persisted");

    Ok((scores, layout.consensus_bundle(topic_id, &outcome.consensus)))
}
