// consensus/core/scoring/normalizer.rs
use std::collections::BTreeSet;

use crate::math::Dec;
use crate::types::{ValueBundle, WithheldWorkerAttributedValue, WorkerAttributedValue};

/// Widens every bundle so the three withheld/one-in categories carry exactly
/// the union of worker keys seen across all bundles, padding missing entries
/// with NaN. Downstream fitting treats losses as ordered vectors, so padding
/// appends in lexicographic key order; the union is collected into BTreeSets
/// rather than iterated out of an unordered map.
///
/// Existing values are never altered or removed, and a second pass is a
/// no-op.
pub fn ensure_worker_presence(bundles: &mut [ValueBundle]) {
    let mut one_out_inferers = BTreeSet::new();
    let mut one_out_forecasters = BTreeSet::new();
    let mut one_in_forecasters = BTreeSet::new();

    for bundle in bundles.iter() {
        for value in &bundle.one_out_inferer_values {
            one_out_inferers.insert(value.worker.clone());
        }
        for value in &bundle.one_out_forecaster_values {
            one_out_forecasters.insert(value.worker.clone());
        }
        for value in &bundle.one_in_forecaster_values {
            one_in_forecasters.insert(value.worker.clone());
        }
    }

    for bundle in bundles.iter_mut() {
        ensure_withheld_workers_present(&mut bundle.one_out_inferer_values, &one_out_inferers);
        ensure_withheld_workers_present(
            &mut bundle.one_out_forecaster_values,
            &one_out_forecasters,
        );
        ensure_workers_present(&mut bundle.one_in_forecaster_values, &one_in_forecasters);
    }
}

fn ensure_workers_present(
    values: &mut Vec<WorkerAttributedValue>,
    all_workers: &BTreeSet<String>,
) {
    let found: BTreeSet<&str> = values.iter().map(|v| v.worker.as_str()).collect();
    let missing: Vec<String> = all_workers
        .iter()
        .filter(|worker| !found.contains(worker.as_str()))
        .cloned()
        .collect();
    for worker in missing {
        values.push(WorkerAttributedValue {
            worker,
            value: Dec::nan(),
        });
    }
}

fn ensure_withheld_workers_present(
    values: &mut Vec<WithheldWorkerAttributedValue>,
    all_workers: &BTreeSet<String>,
) {
    let found: BTreeSet<&str> = values.iter().map(|v| v.worker.as_str()).collect();
    let missing: Vec<String> = all_workers
        .iter()
        .filter(|worker| !found.contains(worker.as_str()))
        .cloned()
        .collect();
    for worker in missing {
        values.push(WithheldWorkerAttributedValue {
            worker,
            value: Dec::nan(),
        });
    }
}
