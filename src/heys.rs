//! The Heys cipher: a 16-bit-block, 4-bit-S-box, 6-round SPN.

use std::sync::Arc;

use crate::error::{AttackError, Result};
use crate::sbox::Sbox;
use crate::tables::CipherTables;

/// Number of rounds of the Heys cipher; fixed by `spec.md` §1.
pub const ROUNDS: usize = 6;

/// The Heys cipher, parameterized by its S-box (via `CipherTables`) and key
/// schedule. Cheap to clone: the tables are held behind an `Arc` and shared
/// read-only across worker threads, exactly as `spec.md` §5 requires.
#[derive(Clone)]
pub struct Heys {
    tables: Arc<CipherTables>,
    keys: Vec<u16>,
}

impl Heys {
    /// Builds a cipher instance from a 4-bit S-box and a key schedule of
    /// length `ROUNDS + 1`. The last subkey is the whitening key XORed after
    /// the final round.
    pub fn new(sbox: &Sbox, keys: Vec<u16>) -> Result<Heys> {
        if keys.len() != ROUNDS + 1 {
            return Err(AttackError::parameter(
                "keys",
                format!("key schedule must have {} subkeys, got {}", ROUNDS + 1, keys.len()),
            ));
        }

        Ok(Heys {
            tables: Arc::new(CipherTables::build(sbox)),
            keys,
        })
    }

    /// Builds a cipher instance from already-expanded tables, useful when
    /// many `Heys` instances (e.g. one per M2 candidate key) should share a
    /// single set of tables instead of rebuilding them.
    pub fn with_tables(tables: Arc<CipherTables>, keys: Vec<u16>) -> Result<Heys> {
        if keys.len() != ROUNDS + 1 {
            return Err(AttackError::parameter(
                "keys",
                format!("key schedule must have {} subkeys, got {}", ROUNDS + 1, keys.len()),
            ));
        }

        Ok(Heys { tables, keys })
    }

    pub fn tables(&self) -> &Arc<CipherTables> {
        &self.tables
    }

    pub fn keys(&self) -> &[u16] {
        &self.keys
    }

    /// Encrypts a single block.
    #[inline]
    pub fn encrypt_block(&self, mut x: u16) -> u16 {
        for r in 0..ROUNDS - 1 {
            x ^= self.keys[r];
            x = self.tables.sbox16[x as usize];
            x = self.tables.perm[x as usize];
        }
        x ^ self.keys[ROUNDS]
    }

    /// Decrypts a single block; the mirror image of `encrypt_block`.
    #[inline]
    pub fn decrypt_block(&self, mut x: u16) -> u16 {
        x ^= self.keys[ROUNDS];
        for r in (0..ROUNDS - 1).rev() {
            x = self.tables.perm[x as usize]; // perm is its own inverse
            x = self.tables.sbox16_inv[x as usize];
            x ^= self.keys[r];
        }
        x
    }

    /// Encrypts a batch of blocks.
    pub fn encrypt(&self, blocks: &[u16]) -> Vec<u16> {
        blocks.iter().map(|&x| self.encrypt_block(x)).collect()
    }

    /// Decrypts a batch of blocks.
    pub fn decrypt(&self, blocks: &[u16]) -> Vec<u16> {
        blocks.iter().map(|&x| self.decrypt_block(x)).collect()
    }
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
    fn round_trip_scenario_c() {
        let sbox = reference_sbox();
        let keys = vec![0xFECC, 0x1488, 0xA23F, 0xE323, 0x1444, 0x2012, 0x0EAA];
        let cipher = Heys::new(&sbox, keys).unwrap();

        let x = 0x4213;
        let ct = cipher.encrypt_block(x);
        assert_eq!(cipher.decrypt_block(ct), x);
    }

    #[test]
    fn rejects_wrong_length_key_schedule() {
        let sbox = reference_sbox();
        assert!(Heys::new(&sbox, vec![0; ROUNDS]).is_err());
        assert!(Heys::new(&sbox, vec![0; ROUNDS + 2]).is_err());
    }

    #[test]
    fn round_trip_holds_for_several_keys_and_blocks() {
        let sbox = reference_sbox();
        let key_schedules = [
            vec![0u16; ROUNDS + 1],
            vec![0xFFFF; ROUNDS + 1],
            vec![0xFECC, 0x1488, 0xA23F, 0xE323, 0x1444, 0x2012, 0x0EAA],
        ];
        let blocks = [0u16, 1, 0xFFFF, 0x1234, 0xBEEF, 0x8421];

        for keys in key_schedules {
            let cipher = Heys::new(&sbox, keys).unwrap();
            for &x in &blocks {
                let ct = cipher.encrypt_block(x);
                assert_eq!(cipher.decrypt_block(ct), x);
            }
        }
    }

    #[test]
    fn batch_encrypt_decrypt_round_trips() {
        let sbox = reference_sbox();
        let keys = vec![0xFECC, 0x1488, 0xA23F, 0xE323, 0x1444, 0x2012, 0x0EAA];
        let cipher = Heys::new(&sbox, keys).unwrap();

        let plaintexts: Vec<u16> = (0..256).collect();
        let ciphertexts = cipher.encrypt(&plaintexts);
        assert_eq!(cipher.decrypt(&ciphertexts), plaintexts);
    }
}
