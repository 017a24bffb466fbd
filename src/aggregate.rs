//! Collapses duplicate rows within one side of a reconcile call: group by
//! SKU when present, else by normalized name, retain the first row's
//! identity fields, and sum quantities.
//!
//! Grouping uses an `FxHashMap` keyed by the aggregation key together with
//! a `Vec` recording first-seen order, rather than iterating a bare hash
//! map — aggregated order needs to be deterministic and reproducible
//! across calls, which a raw hash map iteration cannot guarantee.

use crate::types::NormalizedRow;
use rustc_hash::FxHashMap;

pub fn aggregate(rows: Vec<NormalizedRow>) -> Vec<NormalizedRow> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: FxHashMap<String, NormalizedRow> = FxHashMap::default();

    for row in rows {
        let key = if !row.sku.is_empty() {
            row.sku.clone()
        } else {
            row.name_norm.clone()
        };

        match groups.get_mut(&key) {
            Some(existing) => existing.qty += row.qty,
            None => {
                order.push(key.clone());
                groups.insert(key, row);
            }
        }
    }

    order
        .into_iter()
        .map(|key| groups.remove(&key).expect("key was just inserted"))
        .collect()
}
