//! Known plaintext/ciphertext corpora for M2 key-ranking.

use std::fs;
use std::path::Path;

use crate::error::{AttackError, Result};
use crate::heys::Heys;

/// Two equal-length ordered sequences of blocks: `plaintexts[i]` encrypted
/// under the unknown key yields `ciphertexts[i]`.
#[derive(Clone, Debug)]
pub struct Corpus {
    plaintexts: Vec<u16>,
    ciphertexts: Vec<u16>,
}

impl Corpus {
    /// Builds a corpus from matching plaintext/ciphertext vectors,
    /// validating equal, nonzero length.
    pub fn new(plaintexts: Vec<u16>, ciphertexts: Vec<u16>) -> Result<Corpus> {
        if plaintexts.len() != ciphertexts.len() {
            return Err(AttackError::corpus(format!(
                "plaintext/ciphertext length mismatch: {} vs {}",
                plaintexts.len(),
                ciphertexts.len()
            )));
        }
        if plaintexts.is_empty() {
            return Err(AttackError::corpus("corpus must contain at least one pair"));
        }

        Ok(Corpus {
            plaintexts,
            ciphertexts,
        })
    }

    /// Generates a synthetic corpus of `count` known pairs by encrypting
    /// sequential plaintexts under `cipher`, mirroring
    /// `original_source/heys/attack.py`'s `inputs = arange(...)`.
    pub fn generate(cipher: &Heys, count: usize) -> Result<Corpus> {
        if count == 0 {
            return Err(AttackError::corpus("requested corpus of size zero"));
        }

        let plaintexts: Vec<u16> = (0..count as u32).map(|x| (x % (1 << 16)) as u16).collect();
        let ciphertexts = cipher.encrypt(&plaintexts);

        Corpus::new(plaintexts, ciphertexts)
    }

    pub fn len(&self) -> usize {
        self.plaintexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plaintexts.is_empty()
    }

    pub fn plaintexts(&self) -> &[u16] {
        &self.plaintexts
    }

    pub fn ciphertexts(&self) -> &[u16] {
        &self.ciphertexts
    }

    /// Loads a corpus from a file of little-endian `u16` pairs
    /// `(plaintext, ciphertext)` laid out back to back.
    pub fn load(path: &Path) -> Result<Corpus> {
        let bytes = fs::read(path).map_err(|e| {
            AttackError::persistence(path.display().to_string(), e.to_string())
        })?;

        if bytes.len() % 4 != 0 {
            return Err(AttackError::persistence(
                path.display().to_string(),
                "corpus file length is not a multiple of 4 bytes",
            ));
        }

        let mut plaintexts = Vec::with_capacity(bytes.len() / 4);
        let mut ciphertexts = Vec::with_capacity(bytes.len() / 4);

        for chunk in bytes.chunks_exact(4) {
            plaintexts.push(u16::from_le_bytes([chunk[0], chunk[1]]));
            ciphertexts.push(u16::from_le_bytes([chunk[2], chunk[3]]));
        }

        Corpus::new(plaintexts, ciphertexts)
    }

    /// Saves the corpus as little-endian `u16` pairs, the mirror of `load`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut bytes = Vec::with_capacity(self.plaintexts.len() * 4);
        for (&p, &c) in self.plaintexts.iter().zip(&self.ciphertexts) {
            bytes.extend_from_slice(&p.to_le_bytes());
            bytes.extend_from_slice(&c.to_le_bytes());
        }

        fs::write(path, bytes)
            .map_err(|e| AttackError::persistence(path.display().to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbox::Sbox;

    fn reference_cipher() -> Heys {
        let sbox = Sbox::new([
            0xF, 0x6, 0x5, 0x8, 0xE, 0xB, 0xA, 0x4, 0xC, 0x0, 0x3, 0x7, 0x2, 0x9, 0x1, 0xD,
        ])
        .unwrap();
        Heys::new(&sbox, vec![0xFECC, 0x1488, 0xA23F, 0xE323, 0x1444, 0x2012, 0x0EAA]).unwrap()
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(Corpus::new(vec![0, 1], vec![0]).is_err());
    }

    #[test]
    fn rejects_empty_corpus() {
        assert!(Corpus::new(vec![], vec![]).is_err());
    }

    #[test]
    fn generate_is_consistent_with_cipher() {
        let cipher = reference_cipher();
        let corpus = Corpus::generate(&cipher, 1000).unwrap();

        assert_eq!(corpus.len(), 1000);
        for (&p, &c) in corpus.plaintexts().iter().zip(corpus.ciphertexts()) {
            assert_eq!(cipher.encrypt_block(p), c);
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let cipher = reference_cipher();
        let corpus = Corpus::generate(&cipher, 64).unwrap();

        let path = std::env::temp_dir().join("heys-corpus-test.bin");
        corpus.save(&path).unwrap();
        let loaded = Corpus::load(&path).unwrap();

        assert_eq!(loaded.plaintexts(), corpus.plaintexts());
        assert_eq!(loaded.ciphertexts(), corpus.ciphertexts());

        let _ = fs::remove_file(&path);
    }
}
