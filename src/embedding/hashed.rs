//! Deterministic feature-hashing embedder.
//!
//! Texts are tokenized into lower-cased words (stopwords dropped) and
//! boundary-marked character trigrams. Each feature is hashed with SHA-256
//! into a signed bucket and the result is L2-normalized, so texts that share
//! vocabulary land close together under cosine distance. This captures
//! lexical rather than true semantic similarity.

use super::Embedder;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Limit on tokens considered per text.
const MAX_TOKENS: usize = 1000;

/// Weight of a whole-word feature.
const WORD_WEIGHT: f32 = 1.0;

/// Weight of a character-trigram feature.
const TRIGRAM_WEIGHT: f32 = 0.5;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[\p{L}\p{N}]+").expect("static regex: token pattern")
});

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "did", "do", "for", "from", "had",
    "has", "have", "he", "her", "his", "i", "in", "is", "it", "its", "me", "my", "of", "on", "or",
    "our", "she", "so", "that", "the", "their", "them", "they", "this", "to", "was", "we", "were",
    "what", "with", "you", "your",
];

/// Embedder based on signed feature hashing.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    /// Creates an embedder producing vectors of the given size.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn tokens(text: &str) -> Vec<String> {
        TOKEN_PATTERN
            .find_iter(text)
            .take(MAX_TOKENS)
            .map(|m| m.as_str().to_lowercase())
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bytes);

        let idx = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        embedding[idx] += sign * weight;
    }

    fn normalize(embedding: &mut [f32]) {
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 {
            return;
        }
        let inv_norm = norm_sq.sqrt().recip();
        for v in embedding.iter_mut() {
            *v *= inv_norm;
        }
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(super::DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashedEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(Error::index("embed", "embedder has zero dimensions"));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for token in Self::tokens(text) {
            self.add_feature(&mut embedding, &format!("w:{token}"), WORD_WEIGHT);

            let marked: Vec<char> = format!("^{token}$").chars().collect();
            for gram in marked.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut embedding, &format!("g:{gram}"), TRIGRAM_WEIGHT);
            }
        }

        Self::normalize(&mut embedding);
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashedEmbedder::new(128);
        let a = embedder.embed("The harbor at dawn").expect("embed");
        let b = embedder.embed("The harbor at dawn").expect("embed");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let embedder = HashedEmbedder::default();
        let market = embedder.embed("Explored the market with Mira").expect("embed");
        let query = embedder.embed("What happened at the market?").expect("embed");
        let unrelated = embedder.embed("Sharpened the sword before winter").expect("embed");

        assert!(cosine(&market, &query) > cosine(&unrelated, &query));
    }

    #[test]
    fn test_case_insensitive() {
        let embedder = HashedEmbedder::new(64);
        assert_eq!(
            embedder.embed("Mira").expect("embed"),
            embedder.embed("mira").expect("embed")
        );
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = HashedEmbedder::new(64);
        assert!(embedder.embed("   ").is_err());
    }

    #[test]
    fn test_stopwords_only_is_zero_vector() {
        let embedder = HashedEmbedder::new(64);
        let v = embedder.embed("the and of").expect("embed");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
