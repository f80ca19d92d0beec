//! Opaque token generation
//!
//! Produces `{PREFIX}_{randomness}` tokens from the OS entropy source.
//! The random segment is drawn from an unbiased uppercase-alphanumeric
//! alphabet; no timestamp-derived material is used, so concurrent batch
//! generation cannot collide on wall-clock ticks.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::key::{validate_prefix, KeyKind};
use crate::domain::DomainError;

/// Alphabet for the random token segment: A-Z plus digits (36 symbols)
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest byte value usable for unbiased rejection sampling over 36 symbols
const REJECTION_BOUND: u8 = 252; // 7 * 36

/// Minimum accepted random segment length
pub const MIN_TOKEN_LENGTH: usize = 16;

/// Default random segment length (~103 bits of entropy at 36 symbols)
pub const DEFAULT_TOKEN_LENGTH: usize = 20;

/// Generator for opaque key tokens
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    /// Number of random characters after the prefix
    length: usize,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_TOKEN_LENGTH,
        }
    }

    /// Set the random segment length, clamped to the minimum
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.max(MIN_TOKEN_LENGTH);
        self
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a token with the kind's default prefix
    pub fn generate(&self, kind: KeyKind) -> Result<String, DomainError> {
        self.generate_with_prefix(kind.default_prefix())
    }

    /// Generate a token with a caller-chosen prefix
    pub fn generate_with_prefix(&self, prefix: &str) -> Result<String, DomainError> {
        validate_prefix(prefix).map_err(|e| DomainError::validation(e.to_string()))?;

        let mut token = String::with_capacity(prefix.len() + 1 + self.length);
        token.push_str(prefix);
        token.push('_');

        let mut buf = [0u8; 64];
        let mut produced = 0;

        while produced < self.length {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| DomainError::entropy(format!("OS entropy source unavailable: {e}")))?;

            for byte in buf {
                // Reject bytes >= 252 so every symbol is equally likely
                if byte >= REJECTION_BOUND {
                    continue;
                }
                token.push(ALPHABET[(byte % ALPHABET.len() as u8) as usize] as char);
                produced += 1;
                if produced == self.length {
                    break;
                }
            }
        }

        Ok(token)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}
