//! The approximation table `{alpha -> {beta -> p}}` and its on-disk format.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use fnv::FnvHashMap;

use crate::error::{AttackError, Result};
use crate::sbox::Sbox;

const FILE_MAGIC: &[u8; 4] = b"HEYA";
const FILE_VERSION: u8 = 1;

/// `{alpha -> {beta -> p}}`: all `p` are `> threshold` for whatever
/// threshold the search that produced them used; all `beta` are nonzero.
#[derive(Clone, Debug, Default)]
pub struct Approximations {
    buckets: FnvHashMap<u16, FnvHashMap<u16, f64>>,
}

impl Approximations {
    pub fn new() -> Approximations {
        Approximations {
            buckets: FnvHashMap::default(),
        }
    }

    /// Merges a freshly-searched `{beta -> p}` frontier into the bucket for
    /// `alpha`, keeping the larger value on collision.
    pub fn merge(&mut self, alpha: u16, frontier: FnvHashMap<u16, f64>) {
        let bucket = self.buckets.entry(alpha).or_default();
        for (beta, p) in frontier {
            bucket
                .entry(beta)
                .and_modify(|existing| {
                    if p > *existing {
                        *existing = p;
                    }
                })
                .or_insert(p);
        }
    }

    pub fn bucket(&self, alpha: u16) -> Option<&FnvHashMap<u16, f64>> {
        self.buckets.get(&alpha)
    }

    pub fn alphas(&self) -> impl Iterator<Item = u16> + '_ {
        self.buckets.keys().copied()
    }

    pub fn contains_alpha(&self, alpha: u16) -> bool {
        self.buckets.contains_key(&alpha)
    }

    /// Total number of `(alpha, beta)` approximations across all alphas.
    pub fn total(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.len()).sum()
    }

    /// Flat iteration over every `(alpha, beta, p)` triple, the serialized
    /// record shape (`spec.md` §9 permits either the nested-map or the flat
    /// representation; we keep both, the flat one only for (de)serializing).
    pub fn iter_flat(&self) -> impl Iterator<Item = (u16, u16, f64)> + '_ {
        self.buckets.iter().flat_map(|(&alpha, bucket)| {
            bucket.iter().map(move |(&beta, &p)| (alpha, beta, p))
        })
    }

    /// Saves the table: 4-byte magic, 1-byte version, 8-byte S-box digest,
    /// then `(u16 alpha, u16 beta, f64 p)` records, all little-endian.
    pub fn save(&self, path: &Path, sbox: &Sbox) -> Result<()> {
        let mut bytes = Vec::with_capacity(13 + self.total() * 12);
        bytes.extend_from_slice(FILE_MAGIC);
        bytes.push(FILE_VERSION);
        bytes.extend_from_slice(&sbox.digest().to_le_bytes());

        for (alpha, beta, p) in self.iter_flat() {
            bytes.extend_from_slice(&alpha.to_le_bytes());
            bytes.extend_from_slice(&beta.to_le_bytes());
            bytes.extend_from_slice(&p.to_le_bytes());
        }

        fs::write(path, bytes)
            .map_err(|e| AttackError::persistence(path.display().to_string(), e.to_string()))
    }

    /// Loads a table previously written by `save`. Rejects magic mismatch,
    /// version mismatch, or S-box digest mismatch with a `PersistenceError`
    /// rather than silently falling back to an empty table — recomputing an
    /// approximation table is expensive, so a corrupted load must surface.
    pub fn load(path: &Path, sbox: &Sbox) -> Result<Approximations> {
        let mut file = fs::File::open(path)
            .map_err(|e| AttackError::persistence(path.display().to_string(), e.to_string()))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| AttackError::persistence(path.display().to_string(), e.to_string()))?;

        if bytes.len() < 13 {
            return Err(AttackError::persistence(
                path.display().to_string(),
                "file too short to contain a valid header",
            ));
        }

        let (magic, rest) = bytes.split_at(4);
        if magic != FILE_MAGIC {
            return Err(AttackError::persistence(
                path.display().to_string(),
                "bad magic header",
            ));
        }

        let (version, rest) = rest.split_at(1);
        if version[0] != FILE_VERSION {
            return Err(AttackError::persistence(
                path.display().to_string(),
                format!("unsupported version {}", version[0]),
            ));
        }

        let (digest_bytes, rest) = rest.split_at(8);
        let digest = u64::from_le_bytes(digest_bytes.try_into().unwrap());
        if digest != sbox.digest() {
            return Err(AttackError::persistence(
                path.display().to_string(),
                "S-box digest mismatch: this file was produced with a different S-box",
            ));
        }

        if rest.len() % 12 != 0 {
            return Err(AttackError::persistence(
                path.display().to_string(),
                "truncated record stream",
            ));
        }

        let mut table = Approximations::new();
        for record in rest.chunks_exact(12) {
            let alpha = u16::from_le_bytes([record[0], record[1]]);
            let beta = u16::from_le_bytes([record[2], record[3]]);
            let p = f64::from_le_bytes(record[4..12].try_into().unwrap());

            let mut single = FnvHashMap::default();
            single.insert(beta, p);
            table.merge(alpha, single);
        }

        Ok(table)
    }
}
