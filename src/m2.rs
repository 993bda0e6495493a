//! Matsui's Algorithm 2 (M2): parallel last-round-key ranking.

use std::sync::mpsc;
use std::sync::Arc;

use fnv::FnvHashMap;
use itertools::Itertools;
use log::debug;

use crate::approximations::Approximations;
use crate::bits::parity;
use crate::corpus::Corpus;
use crate::error::{AttackError, Result};
use crate::tables::CipherTables;

/// Scores every candidate last-round key `k` against a single `(alpha,
/// beta)` approximation over the corpus, returning `|T_k|` for all 65536
/// keys (`k = 0` included; the spec only excludes it from approximation
/// output masks, not from key candidates).
fn score_all_keys(tables: &CipherTables, corpus: &Corpus, alpha: u16, beta: u16) -> Vec<i64> {
    let plaintexts = corpus.plaintexts();
    let ciphertexts = corpus.ciphertexts();

    (0..=0xFFFFu32)
        .map(|key| {
            let key = key as u16;
            let mut t: i64 = 0;
            for (&x, &y) in plaintexts.iter().zip(ciphertexts) {
                let round_out = tables.perm[tables.sbox16[(x ^ key) as usize] as usize];
                let bit = parity(alpha, round_out) ^ parity(beta, y);
                t += if bit == 0 { 1 } else { -1 };
            }
            t.abs()
        })
        .collect()
}

/// Returns the `top_keys` candidates with highest `|T_k|` for a single
/// `(alpha, beta)` pair. Ties at the selection boundary are broken by key
/// value (ascending) for reproducibility, as `spec.md` §4.5 requires.
fn top_keys_for_approximation(
    tables: &CipherTables,
    corpus: &Corpus,
    alpha: u16,
    beta: u16,
    top_keys: usize,
) -> Vec<u16> {
    let scores = score_all_keys(tables, corpus, alpha, beta);

    let mut ranked: Vec<(i64, u16)> = scores
        .into_iter()
        .enumerate()
        .map(|(key, score)| (score, key as u16))
        .collect();

    // Descending by score, ascending by key value as the deterministic
    // tie-break.
    ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.truncate(top_keys);

    ranked.into_iter().map(|(_, key)| key).collect()
}

/// Runs M2 over every `(alpha, beta)` approximation, in parallel across the
/// beta dimension, and returns the merged key-vote multiset.
///
/// Mirrors the teacher's `parallel_find_properties` worker pattern
/// (`crossbeam_utils::thread::scope` + `mpsc`, work split by
/// `skip(t).step_by(threads)`), generalized from "best properties of a
/// graph" to "top-K keys per approximation".
pub fn m2(
    tables: &Arc<CipherTables>,
    corpus: &Corpus,
    approximations: &Approximations,
    top_keys: usize,
    threads: usize,
) -> Result<FnvHashMap<u16, u32>> {
    let pairs: Vec<(u16, u16)> = approximations
        .iter_flat()
        .map(|(alpha, beta, _p)| (alpha, beta))
        .collect();

    if pairs.is_empty() {
        return Ok(FnvHashMap::default());
    }

    let threads = threads.max(1);
    let (result_tx, result_rx) = mpsc::channel();

    let scope_result = crossbeam_utils::thread::scope(|scope| {
        for t in 0..threads {
            let result_tx = result_tx.clone();
            let pairs = &pairs;
            let tables = Arc::clone(tables);

            scope.spawn(move |_| {
                let mut votes = Vec::new();

                for &(alpha, beta) in pairs.iter().skip(t).step_by(threads) {
                    let winners =
                        top_keys_for_approximation(&tables, corpus, alpha, beta, top_keys);
                    votes.extend(winners);
                }

                result_tx
                    .send(votes)
                    .expect("main thread dropped the result channel");
            });
        }
    });

    drop(result_tx);

    scope_result
        .map_err(|_| AttackError::worker("a worker thread panicked during M2 key ranking"))?;

    let all_votes: Vec<u16> = result_rx.into_iter().flatten().collect();

    debug!(
        "M2 collected {} votes across {} approximations",
        all_votes.len(),
        pairs.len()
    );

    let counts: FnvHashMap<u16, u32> = all_votes
        .into_iter()
        .counts()
        .into_iter()
        .map(|(key, count)| (key, count as u32))
        .collect();

    Ok(counts)
}

/// Ranks a key-vote counter by descending frequency, breaking ties by key
/// value ascending.
pub fn rank_keys(votes: &FnvHashMap<u16, u32>) -> Vec<(u16, u32)> {
    let mut ranked: Vec<(u16, u32)> = votes.iter().map(|(&k, &c)| (k, c)).collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}
