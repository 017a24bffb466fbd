//! The matching core: SKU -> exact-normalized -> fuzzy, at-most-one-use
//! allocation of B rows, and the numeric-unit guard that keeps fuzzy
//! matches from crossing materially different sizes.

use crate::index::IndexB;
use crate::normalize::token_sort;
use crate::types::{MatchRecord, Method, NormalizedRow, Options, Unmatched};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

pub struct MatchOutcome {
    pub rows: Vec<MatchRecord>,
    pub only_a: Vec<Unmatched>,
    pub only_b: Vec<Unmatched>,
}

/// Per-call cancellation signal, checked between A rows during allocation.
pub trait Cancellation: Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool + Sync> Cancellation for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Tracks which B rows (by index into `IndexB::rows`) have already been
/// allocated to a match. Indexed by row identity rather than by `sku`/
/// `name_norm` string: two distinct aggregated B rows can legitimately share
/// a normalized name (e.g. same product under two SKUs), and consuming one
/// of them must not also block the other — only a literal re-use of the
/// same physical row violates the "every B row used at most once" invariant.
#[derive(Default)]
struct UsedSet(FxHashSet<usize>);

impl UsedSet {
    fn is_used(&self, idx: usize) -> bool {
        self.0.contains(&idx)
    }

    fn mark_used(&mut self, idx: usize) {
        self.0.insert(idx);
    }
}

/// Damerau-Levenshtein edit distance allowing insert, delete, substitute,
/// and transposition of two adjacent code points, each costing 1.
fn damerau_distance(a: &[char], b: &[char]) -> usize {
    let (al, bl) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; bl + 1]; al + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=bl {
        dp[0][j] = j;
    }
    for i in 1..=al {
        for j in 1..=bl {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                dp[i][j] = dp[i][j].min(dp[i - 2][j - 2] + 1);
            }
        }
    }
    dp[al][bl]
}

/// Normalized Damerau-Levenshtein similarity in (0, 1].
pub fn dl_sim(a: &str, b: &str) -> f64 {
    let ca: Vec<char> = a.chars().collect();
    let cb: Vec<char> = b.chars().collect();
    if ca.is_empty() && cb.is_empty() {
        return 1.0;
    }
    if ca.is_empty() || cb.is_empty() {
        return 0.0;
    }
    let d = damerau_distance(&ca, &cb);
    let m = ca.len().max(cb.len());
    1.0 - (d as f64) / (m as f64)
}

/// `max(dl_sim(a, b), dl_sim(token_sort(a), token_sort(b)))`.
pub fn best_sim(a: &str, b: &str) -> f64 {
    let direct = dl_sim(a, b);
    let sorted = dl_sim(&token_sort(a), &token_sort(b));
    direct.max(sorted)
}

/// Sorted-multiset "at most one mismatch" comparison between two sets of
/// numeric-unit atoms.
pub fn soft_equal(a: &[String], b: &[String]) -> bool {
    if a.len() > b.len() + 1 {
        return false;
    }
    let (mut i, mut j, mut mismatches) = (0usize, 0usize, 0usize);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            mismatches += 1;
            i += 1;
        } else {
            mismatches += 1;
            j += 1;
        }
    }
    mismatches += (a.len() - i) + (b.len() - j);
    mismatches <= 1
}

/// Tie-break policy over a single bucket of B-row indices: skip used rows,
/// prefer higher similarity (ties within 0.02), then non-zero quantity,
/// then smaller `|qty_a - qty_b|`, then earliest index in the bucket.
fn choose_best(bucket: &[usize], ar: &NormalizedRow, idx: &IndexB, used: &UsedSet) -> Option<usize> {
    const TIE_EPS: f64 = 0.02;

    let mut best: Option<(usize, f64)> = None; // (row index, sim)
    for &cand_idx in bucket {
        if used.is_used(cand_idx) {
            continue;
        }
        let cand = &idx.rows[cand_idx];
        let sim = best_sim(&ar.name_norm, &cand.name_norm);
        best = Some(match best {
            None => (cand_idx, sim),
            Some((best_idx, best_sim_val)) => {
                if sim > best_sim_val + TIE_EPS {
                    (cand_idx, sim)
                } else if sim < best_sim_val - TIE_EPS {
                    (best_idx, best_sim_val)
                } else {
                    // tie on similarity: non-zero qty, then closer |delta|,
                    // then earliest bucket index (already satisfied by not
                    // overwriting `best` unless candidate strictly wins).
                    let best_row = &idx.rows[best_idx];
                    let cand_nonzero = cand.qty != 0.0;
                    let best_nonzero = best_row.qty != 0.0;
                    if cand_nonzero && !best_nonzero {
                        (cand_idx, sim)
                    } else if !cand_nonzero && best_nonzero {
                        (best_idx, best_sim_val)
                    } else {
                        let cand_delta = (ar.qty - cand.qty).abs();
                        let best_delta = (ar.qty - best_row.qty).abs();
                        if cand_delta < best_delta {
                            (cand_idx, sim)
                        } else {
                            (best_idx, best_sim_val)
                        }
                    }
                }
            }
        });
    }
    best.map(|(i, _)| i)
}

struct FuzzyCandidate {
    name: String,
    score: f64,
}

/// Tier-3 candidate search: trigram-ranked candidates first, guarded by
/// `soft_equal` on numeric-unit atoms, scored by
/// `best_sim`; falls back to a linear scan over all of B's distinct names
/// only when the trigram index produced no candidate clearing the
/// threshold-and-guard. Read-only against `idx`, safe to run in parallel
/// across A rows.
fn find_fuzzy_candidate(ar: &NormalizedRow, idx: &IndexB, opt: &Options) -> Option<FuzzyCandidate> {
    if ar.name_norm.is_empty() {
        return None;
    }

    let mut best_name = String::new();
    let mut best = -1.0f64;

    for cand_name in idx.candidate_names(&ar.name_norm) {
        if !soft_equal(&ar.num_units, idx.num_units_for(&cand_name)) {
            continue;
        }
        let sim = best_sim(&ar.name_norm, &cand_name);
        if sim > opt.threshold && sim > best {
            best = sim;
            best_name = cand_name;
        }
    }

    if best_name.is_empty() {
        for cand_name in idx.all_names() {
            if !soft_equal(&ar.num_units, idx.num_units_for(cand_name)) {
                continue;
            }
            let sim = best_sim(&ar.name_norm, cand_name);
            if sim > opt.threshold && sim > best {
                best = sim;
                best_name = cand_name.to_string();
            }
        }
    }

    if best_name.is_empty() {
        None
    } else {
        Some(FuzzyCandidate {
            name: best_name,
            score: best,
        })
    }
}

fn pick(a: &str, b: &str) -> String {
    if !a.trim().is_empty() {
        a.to_string()
    } else {
        b.to_string()
    }
}

/// Runs the three-tier matcher over aggregated A against `idx` (built over
/// aggregated B). The expensive Tier-3 candidate search is parallelized
/// across A rows (read-only against `idx`); bucket allocation and every
/// `UsedSet` mutation run in a single sequential pass over A in its
/// aggregated order, so the result is independent of thread count.
pub fn run(
    a_rows: &[NormalizedRow],
    idx: &IndexB,
    opt: &Options,
    cancel: Option<&dyn Cancellation>,
) -> Result<MatchOutcome, crate::error::ReconcileError> {
    let fuzzy_candidates: Vec<Option<FuzzyCandidate>> = if opt.enable_fuzzy && !opt.strict_after_norm {
        a_rows
            .par_iter()
            .map(|ar| find_fuzzy_candidate(ar, idx, opt))
            .collect()
    } else {
        a_rows.iter().map(|_| None).collect()
    };

    let mut used = UsedSet::default();
    let mut rows = Vec::with_capacity(a_rows.len());
    let mut only_a = Vec::new();

    for (i, ar) in a_rows.iter().enumerate() {
        if let Some(c) = cancel {
            if c.is_cancelled() {
                return Err(crate::error::ReconcileError::Cancelled);
            }
        }

        let mut chosen: Option<(usize, Method, Option<f64>)> = None;

        if !ar.sku.is_empty() {
            if let Some(bucket) = idx.by_sku.get(&ar.sku) {
                if let Some(b) = choose_best(bucket, ar, idx, &used) {
                    chosen = Some((b, Method::Sku, None));
                }
            }
        }

        if chosen.is_none() && !ar.name_norm.is_empty() {
            if let Some(bucket) = idx.by_name.get(&ar.name_norm) {
                if let Some(b) = choose_best(bucket, ar, idx, &used) {
                    chosen = Some((b, Method::Exact, None));
                }
            }
        }

        if chosen.is_none() {
            if let Some(fc) = &fuzzy_candidates[i] {
                if let Some(bucket) = idx.by_name.get(&fc.name) {
                    if let Some(b) = choose_best(bucket, ar, idx, &used) {
                        chosen = Some((b, Method::Fuzzy, Some(fc.score)));
                    }
                }
            }
        }

        match chosen {
            Some((b_idx, method, score)) => {
                let b = &idx.rows[b_idx];
                trace!(a_name = %ar.name, b_name = %b.name, method = method.as_str(), "matched");
                rows.push(MatchRecord {
                    name: pick(&ar.name, &b.name),
                    sku: pick(&ar.sku, &b.sku),
                    qty_a: ar.qty,
                    qty_b: b.qty,
                    delta: ar.qty - b.qty,
                    method,
                    score,
                });
                used.mark_used(b_idx);
            }
            None => only_a.push(Unmatched {
                name: ar.name.clone(),
                sku: ar.sku.clone(),
                qty: ar.qty,
            }),
        }
    }

    let mut only_b = Vec::new();
    for (i, b) in idx.rows.iter().enumerate() {
        if !used.is_used(i) {
            only_b.push(Unmatched {
                name: b.name.clone(),
                sku: b.sku.clone(),
                qty: b.qty,
            });
        }
    }

    debug!(matched = rows.len(), only_a = only_a.len(), only_b = only_b.len(), "matcher finished");

    Ok(MatchOutcome { rows, only_a, only_b })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dl_sim_identical() {
        assert_eq!(dl_sim("abc", "abc"), 1.0);
    }

    #[test]
    fn dl_sim_empty_cases() {
        assert_eq!(dl_sim("", ""), 1.0);
        assert_eq!(dl_sim("", "x"), 0.0);
        assert_eq!(dl_sim("x", ""), 0.0);
    }

    #[test]
    fn dl_sim_transposition_costs_one() {
        // "ab" -> "ba" is a single adjacent transposition.
        let sim = dl_sim("ab", "ba");
        assert_eq!(sim, 0.5); // 1 - 1/2
    }

    #[test]
    fn soft_equal_allows_single_mismatch() {
        let a = vec!["48mm".to_string()];
        let b: Vec<String> = vec![];
        assert!(soft_equal(&a, &b));
    }

    #[test]
    fn soft_equal_rejects_two_mismatches() {
        let a = vec!["48mm".to_string(), "66m".to_string()];
        let b: Vec<String> = vec![];
        assert!(!soft_equal(&a, &b));
    }

    #[test]
    fn soft_equal_rejects_materially_different_dims() {
        let a = vec!["48mm".to_string()];
        let b = vec!["72mm".to_string()];
        assert!(!soft_equal(&a, &b));
    }

    #[test]
    fn soft_equal_identical_sets() {
        let a = vec!["48mm".to_string(), "66m".to_string()];
        let b = vec!["48mm".to_string(), "66m".to_string()];
        assert!(soft_equal(&a, &b));
    }
}
