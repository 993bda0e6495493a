//! Branch-and-bound search for high-probability linear approximations of
//! the Heys cipher reduced by one round.

use fnv::FnvHashMap;
use log::debug;
use rand::Rng;

use crate::sbox::Sbox;
use crate::tables::CipherTables;

/// How candidate output masks are generated at each round of the search.
#[derive(Clone, Copy, Debug)]
pub enum BetaStrategy {
    /// Enumerate every non-zero 16-bit mask. Exact, deterministic, and the
    /// default per `spec.md` §4.4.
    Exact,
    /// Draw `attempts` random non-zero masks per round instead of
    /// enumerating all 65535. Opt-in; trades exactness for speed.
    Sampled { attempts: usize },
}

/// A single round of the branch-and-bound recursion: given the current
/// frontier `{gamma: p_gamma}`, accumulates the next frontier `{beta: p}`.
///
/// The S-box mask `beta'` that yields output mask `beta` after the
/// permutation layer is `P^{-1}[beta] = P[beta]` (P is involutive), so the
/// permutation is applied to the candidate `beta` before looking up the LAT.
fn step(
    tables: &CipherTables,
    sbox: &Sbox,
    frontier: &FnvHashMap<u16, f64>,
    strategy: BetaStrategy,
) -> FnvHashMap<u16, f64> {
    let mut next: FnvHashMap<u16, f64> = FnvHashMap::default();

    let mut record = |beta: u16, delta: f64| {
        if delta != 0.0 {
            *next.entry(beta).or_insert(0.0) += delta;
        }
    };

    for (&gamma, &p_gamma) in frontier {
        match strategy {
            BetaStrategy::Exact => {
                for beta in 1..=0xFFFFu16 {
                    let delta = p_gamma * round_correlation(sbox, tables, gamma, beta);
                    record(beta, delta);
                }
            }
            BetaStrategy::Sampled { attempts } => {
                let mut rng = rand::thread_rng();
                for _ in 0..attempts {
                    let beta: u16 = rng.gen_range(1..=0xFFFF);
                    let delta = p_gamma * round_correlation(sbox, tables, gamma, beta);
                    record(beta, delta);
                }
            }
        }
    }

    next
}

/// `q(gamma -> beta) = prod_b LAT[nibble_b(gamma), nibble_b(P[beta])]`.
#[inline]
fn round_correlation(sbox: &Sbox, tables: &CipherTables, gamma: u16, beta: u16) -> f64 {
    let permuted = tables.perm[beta as usize];
    let mut q = 1.0;
    for b in 0..4 {
        let a_nibble = ((gamma >> (4 * b)) & 0xF) as u8;
        let b_nibble = ((permuted >> (4 * b)) & 0xF) as u8;
        q *= sbox.lp(a_nibble, b_nibble);
        if q == 0.0 {
            break;
        }
    }
    q
}

/// Searches for `(R-1)`-round linear approximations starting from `alpha`,
/// pruning the frontier to entries with probability greater than
/// `threshold` after every round. Returns `{beta: p}` with `p > threshold`
/// and `beta != 0` for all entries, as `spec.md` §4.4 requires.
pub fn branch_bound(
    tables: &CipherTables,
    sbox: &Sbox,
    alpha: u16,
    rounds: usize,
    threshold: f64,
    strategy: BetaStrategy,
) -> FnvHashMap<u16, f64> {
    let mut frontier: FnvHashMap<u16, f64> = FnvHashMap::default();
    frontier.insert(alpha, 1.0);

    for round in 0..rounds {
        let next = step(tables, sbox, &frontier, strategy);

        frontier = next
            .into_iter()
            .filter(|&(beta, p)| beta != 0 && p > threshold)
            .collect();

        debug!(
            "branch_bound round {}/{}: alpha=0x{:04x} frontier size={}",
            round + 1,
            rounds,
            alpha,
            frontier.len()
        );

        if frontier.is_empty() {
            break;
        }
    }

    frontier
}
