//! Composes approximation search and M2 key-ranking into the full attack.

use std::path::PathBuf;
use std::sync::Arc;

use fnv::FnvHashMap;
use log::info;

use crate::approximations::Approximations;
use crate::branch_bound::{branch_bound, BetaStrategy};
use crate::corpus::Corpus;
use crate::error::Result;
use crate::heys::{Heys, ROUNDS};
use crate::m2;
use crate::sbox::Sbox;
use crate::tables::CipherTables;

/// Parameters governing a single attack run.
pub struct AttackConfig {
    /// Seed input masks for branch-and-bound. Typical choices activate a
    /// single nibble: `0xF`, `0xF0`, `0xF00`, `0xF000`.
    pub alphas: Vec<u16>,
    /// Branch-and-bound probability threshold below which a mask is pruned.
    pub threshold: f64,
    /// Stop discovering new approximations once the total count across all
    /// alphas reaches this, or once every alpha has been processed once.
    pub max_approximations: usize,
    /// Number of search attempts per alpha (relevant mainly for the sampled
    /// beta strategy, where repeated attempts explore different candidates).
    pub attempts_per_alpha: usize,
    pub beta_strategy: BetaStrategy,
    /// Number of top-scoring keys to keep per (alpha, beta) in M2.
    pub top_keys: usize,
    /// Number of worker threads for M2. Defaults to the number of logical CPUs.
    pub threads: usize,
    /// Optional path to persist/reload the approximation table.
    pub approximations_path: Option<PathBuf>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        AttackConfig {
            alphas: vec![0x000F, 0x00F0, 0x0F00, 0xF000],
            threshold: 1e-5,
            max_approximations: 600,
            attempts_per_alpha: 1,
            beta_strategy: BetaStrategy::Exact,
            top_keys: 100,
            threads: num_cpus::get(),
            approximations_path: None,
        }
    }
}

/// Result of a completed attack: the approximation table that was used and
/// the merged key-vote counter.
pub struct AttackResult {
    pub approximations: Approximations,
    pub votes: FnvHashMap<u16, u32>,
}

/// Drives the two-stage attack: branch-and-bound approximation discovery
/// followed by M2 key-ranking, against `(R-1) = ROUNDS - 1` rounds of Heys.
pub struct Attack<'a> {
    sbox: &'a Sbox,
    tables: Arc<CipherTables>,
    config: AttackConfig,
}

impl<'a> Attack<'a> {
    pub fn new(sbox: &'a Sbox, config: AttackConfig) -> Attack<'a> {
        Attack {
            sbox,
            tables: Arc::new(CipherTables::build(sbox)),
            config,
        }
    }

    /// Runs the full pipeline against `corpus` and returns the discovered
    /// approximations plus the key-vote counter.
    pub fn run(&self, corpus: &Corpus) -> Result<AttackResult> {
        let approximations = self.find_approximations()?;

        info!(
            "running M2 over {} approximations, {} threads",
            approximations.total(),
            self.config.threads
        );

        let votes = m2::m2(
            &self.tables,
            corpus,
            &approximations,
            self.config.top_keys,
            self.config.threads,
        )?;

        Ok(AttackResult {
            approximations,
            votes,
        })
    }

    /// Discovers `(ROUNDS - 1)`-round linear approximations for the
    /// configured alphas, loading/persisting an existing table when
    /// `approximations_path` is set, and stopping once either the quota is
    /// met or every alpha has been processed once, per `spec.md` §4.6.
    pub fn find_approximations(&self) -> Result<Approximations> {
        let mut approximations = self.load_existing()?;

        info!(
            "{} approximations loaded from cache",
            approximations.total()
        );

        if approximations.total() >= self.config.max_approximations {
            return Ok(approximations);
        }

        for (alpha_id, &alpha) in self.config.alphas.iter().enumerate() {
            info!(
                "searching alpha {}/{}: 0x{:04x}",
                alpha_id + 1,
                self.config.alphas.len(),
                alpha
            );

            for _ in 0..self.config.attempts_per_alpha.max(1) {
                let frontier = branch_bound(
                    &self.tables,
                    self.sbox,
                    alpha,
                    ROUNDS - 1,
                    self.config.threshold,
                    self.config.beta_strategy,
                );
                approximations.merge(alpha, frontier);
            }

            info!("total approximations so far: {}", approximations.total());

            if let Some(path) = &self.config.approximations_path {
                approximations.save(path, self.sbox)?;
            }

            if approximations.total() >= self.config.max_approximations {
                break;
            }
        }

        Ok(approximations)
    }

    fn load_existing(&self) -> Result<Approximations> {
        match &self.config.approximations_path {
            Some(path) if path.exists() => Approximations::load(path, self.sbox),
            _ => Ok(Approximations::new()),
        }
    }

    pub fn tables(&self) -> &Arc<CipherTables> {
        &self.tables
    }
}

/// Convenience: builds a `Heys` cipher sharing this attack's expanded
/// tables, for callers (tests, the CLI's self-test mode) that need to
/// encrypt/decrypt under a known key schedule.
pub fn cipher_with_tables(tables: Arc<CipherTables>, keys: Vec<u16>) -> Result<Heys> {
    Heys::with_tables(tables, keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_sbox() -> Sbox {
        Sbox::new([
            0xF, 0x6, 0x5, 0x8, 0xE, 0xB, 0xA, 0x4, 0xC, 0x0, 0x3, 0x7, 0x2, 0x9, 0x1, 0xD,
        ])
        .unwrap()
    }

    #[test]
    fn stops_once_alphas_are_exhausted() {
        let sbox = reference_sbox();
        let config = AttackConfig {
            alphas: vec![0x000F],
            threshold: 1e-3,
            max_approximations: usize::MAX,
            ..AttackConfig::default()
        };
        let attack = Attack::new(&sbox, config);

        let approximations = attack.find_approximations().unwrap();
        assert!(approximations.contains_alpha(0x000F) || approximations.total() == 0);
    }

    #[test]
    fn stops_once_quota_is_met() {
        let sbox = reference_sbox();
        let config = AttackConfig {
            alphas: vec![0x000F, 0x00F0, 0x0F00, 0xF000],
            threshold: 1e-4,
            max_approximations: 1,
            ..AttackConfig::default()
        };
        let attack = Attack::new(&sbox, config);

        let approximations = attack.find_approximations().unwrap();
        // Should stop searching further alphas as soon as the quota is hit;
        // at most a couple of alphas get processed before the break.
        assert!(approximations.total() >= 1);
    }

    #[test]
    fn end_to_end_attack_recovers_last_round_key() {
        let sbox = reference_sbox();
        let keys = vec![0xFECC, 0x1488, 0xA23F, 0xE323, 0x1444, 0x2012, 0x0EAA];
        let last_round_key = keys[ROUNDS];

        let config = AttackConfig {
            alphas: vec![0x000F, 0x00F0, 0x0F00, 0xF000],
            threshold: 5e-5,
            max_approximations: 12,
            top_keys: 100,
            threads: 1,
            ..AttackConfig::default()
        };

        let attack = Attack::new(&sbox, config);
        let cipher = cipher_with_tables(Arc::clone(attack.tables()), keys).unwrap();
        let corpus = Corpus::generate(&cipher, 20_000).unwrap();

        let result = attack.run(&corpus).unwrap();
        let ranked = m2::rank_keys(&result.votes);
        let top10: Vec<u16> = ranked.iter().take(10).map(|&(k, _)| k).collect();

        assert!(top10.contains(&last_round_key));
    }
}
