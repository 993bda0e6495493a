//! Expanded 16-bit S-box and permutation tables, and their disk cache.
//!
//! Lifts the implicit global state of a cipher's derived tables into an
//! explicit value (`spec.md` §9), constructed once from `(S, P)` and shared
//! by reference (`Arc`) across every worker thread.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::sbox::Sbox;

const CACHE_MAGIC: &[u8; 4] = b"HEYT";
const CACHE_VERSION: u8 = 1;

/// The block size, in bits, of the Heys cipher: four 4-bit S-box instances
/// side by side.
pub const BLOCK_BITS: usize = 16;
pub const NIBBLES: usize = 4;

/// Derived, read-only lookup tables shared by every worker thread.
pub struct CipherTables {
    /// `sbox16[w]` applies the 4-bit S-box independently to each nibble of `w`.
    pub sbox16: Vec<u16>,
    /// Inverse of `sbox16`.
    pub sbox16_inv: Vec<u16>,
    /// `perm[w]` moves bit `4*b+i` of `w` to bit `4*i+b`. An involution.
    pub perm: Vec<u16>,
    digest: u64,
}

impl CipherTables {
    /// Builds the expanded tables directly from the S-box, without
    /// consulting any on-disk cache.
    pub fn build(sbox: &Sbox) -> CipherTables {
        let sbox16 = expand_sbox(sbox, false);
        let sbox16_inv = expand_sbox(sbox, true);
        let perm = build_permutation();

        CipherTables {
            sbox16,
            sbox16_inv,
            perm,
            digest: sbox.digest(),
        }
    }

    /// Builds the expanded tables, consulting a cache file named after the
    /// S-box's content digest under `cache_dir`. A missing or corrupted
    /// cache is treated purely as an optimization miss: it is silently
    /// recomputed and rewritten, since these tables are a few megabytes at
    /// most and pure functions of `sbox`.
    pub fn load_or_build(sbox: &Sbox, cache_dir: &Path) -> CipherTables {
        let path = cache_path(cache_dir, sbox);

        if let Some(tables) = Self::try_load(&path, sbox) {
            return tables;
        }

        let tables = Self::build(sbox);
        let _ = tables.try_save(&path);
        tables
    }

    fn try_load(path: &Path, sbox: &Sbox) -> Option<CipherTables> {
        let mut file = fs::File::open(path).ok()?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).ok()?;

        if bytes.len() < 4 + 1 + 8 {
            return None;
        }

        let (magic, rest) = bytes.split_at(4);
        if magic != CACHE_MAGIC {
            return None;
        }
        let (version, rest) = rest.split_at(1);
        if version[0] != CACHE_VERSION {
            return None;
        }
        let (digest_bytes, rest) = rest.split_at(8);
        let digest = u64::from_le_bytes(digest_bytes.try_into().ok()?);
        if digest != sbox.digest() {
            return None;
        }

        let expected_len = 3 * (1 << BLOCK_BITS) * 2;
        if rest.len() != expected_len {
            return None;
        }

        let mut u16s = rest
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]));

        let table_len = 1 << BLOCK_BITS;
        let sbox16: Vec<u16> = (&mut u16s).take(table_len).collect();
        let sbox16_inv: Vec<u16> = (&mut u16s).take(table_len).collect();
        let perm: Vec<u16> = (&mut u16s).take(table_len).collect();

        Some(CipherTables {
            sbox16,
            sbox16_inv,
            perm,
            digest,
        })
    }

    fn try_save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(CACHE_MAGIC)?;
        file.write_all(&[CACHE_VERSION])?;
        file.write_all(&self.digest.to_le_bytes())?;

        for table in [&self.sbox16, &self.sbox16_inv, &self.perm] {
            for &w in table {
                file.write_all(&w.to_le_bytes())?;
            }
        }

        Ok(())
    }
}

fn cache_path(cache_dir: &Path, sbox: &Sbox) -> PathBuf {
    cache_dir.join(format!("{:016x}.heys-tables", sbox.digest()))
}

/// Expands the 4-bit S-box (or its inverse) to a 65536-entry nibble-wise table.
fn expand_sbox(sbox: &Sbox, inverse: bool) -> Vec<u16> {
    let mut table = vec![0u16; 1 << BLOCK_BITS];
    for (w, slot) in table.iter_mut().enumerate() {
        let mut out: u16 = 0;
        for b in 0..NIBBLES {
            let nibble = ((w >> (4 * b)) & 0xF) as u8;
            let substituted = if inverse {
                sbox.apply_inverse(nibble)
            } else {
                sbox.apply(nibble)
            };
            out |= u16::from(substituted) << (4 * b);
        }
        *slot = out;
    }
    table
}

/// Builds the fixed bit-permutation table: bit `4*b+i` of the input moves to
/// bit `4*i+b` of the output, for `b, i` in `0..4`.
fn build_permutation() -> Vec<u16> {
    let mut table = vec![0u16; 1 << BLOCK_BITS];
    for (w, slot) in table.iter_mut().enumerate() {
        let w = w as u16;
        let mut out: u16 = 0;
        for b in 0..NIBBLES {
            for i in 0..NIBBLES {
                let bit = (w >> (4 * b + i)) & 1;
                out |= bit << (4 * i + b);
            }
        }
        *slot = out;
    }
    table
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
    fn permutation_fixed_point_scenario_a() {
        let perm = build_permutation();
        assert_eq!(perm[0x8421], 0x8421);
    }

    #[test]
    fn permutation_samples_scenario_b() {
        let perm = build_permutation();
        assert_eq!(perm[0x2B12], 0x40D6);
        assert_eq!(perm[0x59CB], 0x7A1D);
        assert_eq!(perm[0x1001], 0x0009);
    }

    #[test]
    fn permutation_is_an_involution() {
        let perm = build_permutation();
        for w in (0..=0xFFFFu32).step_by(997) {
            let w = w as u16;
            assert_eq!(perm[perm[w as usize] as usize], w);
        }
    }

    #[test]
    fn sbox16_inverse_round_trips() {
        let sbox = reference_sbox();
        let tables = CipherTables::build(&sbox);
        for w in (0..=0xFFFFu32).step_by(131) {
            let w = w as u16;
            assert_eq!(tables.sbox16_inv[tables.sbox16[w as usize] as usize], w);
            assert_eq!(tables.sbox16[tables.sbox16_inv[w as usize] as usize], w);
        }
    }

    #[test]
    fn cache_round_trips_through_disk() {
        let sbox = reference_sbox();
        let dir = std::env::temp_dir().join(format!("heys-tables-test-{:x}", sbox.digest()));
        let _ = fs::remove_dir_all(&dir);

        let built = CipherTables::load_or_build(&sbox, &dir);
        let loaded = CipherTables::load_or_build(&sbox, &dir);

        assert_eq!(built.sbox16, loaded.sbox16);
        assert_eq!(built.perm, loaded.perm);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupted_cache_is_rebuilt_not_trusted() {
        let sbox = reference_sbox();
        let dir = std::env::temp_dir().join(format!("heys-tables-corrupt-{:x}", sbox.digest()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let path = cache_path(&dir, &sbox);
        fs::write(&path, b"not a valid cache file").unwrap();

        let tables = CipherTables::load_or_build(&sbox, &dir);
        assert_eq!(tables.perm[0x8421], 0x8421);

        let _ = fs::remove_dir_all(&dir);
    }
}
