use lazy_static::lazy_static;
use ndarray::Array1;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::knowledge::KnowledgeItem;

lazy_static! {
    static ref NON_TOKEN_CHARS: Regex =
        Regex::new(r"[^a-z0-9\s]").expect("tokenizer pattern is valid");
}

/// Splits text into lowercase alphanumeric tokens longer than one character.
///
/// Corpus chunks and queries must go through this same function, otherwise
/// their vectors do not share a space.
pub fn tokenize(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let text = NON_TOKEN_CHARS.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|token| token.len() > 1)
        .map(|token| token.to_string())
        .collect()
}

/// Token to vector position, in first-seen order. Frozen once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    positions: FxHashMap<String, usize>,
    terms: Vec<String>,
}

impl Vocabulary {
    fn from_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut vocabulary = Self::default();
        for text in texts {
            for token in tokenize(text) {
                if !vocabulary.positions.contains_key(&token) {
                    vocabulary.positions.insert(token.clone(), vocabulary.terms.len());
                    vocabulary.terms.push(token);
                }
            }
        }
        vocabulary
    }

    pub fn position(&self, token: &str) -> Option<usize> {
        self.positions.get(token).copied()
    }

    /// Terms ordered by position.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct VectorStoreEntry {
    pub text: String,
    pub embedding: Array1<f32>,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

/// Immutable term-frequency index over a knowledge corpus.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    vocabulary: Vocabulary,
    entries: Vec<VectorStoreEntry>,
}

impl VectorIndex {
    /// Builds the vocabulary over every chunk first, then embeds each chunk,
    /// so all vectors have the final dimensionality.
    pub fn build(items: &[KnowledgeItem]) -> Self {
        let chunks: Vec<String> = items.iter().map(KnowledgeItem::chunk_text).collect();
        let vocabulary = Vocabulary::from_texts(chunks.iter().map(String::as_str));

        let mut index = VectorIndex {
            vocabulary,
            entries: Vec::with_capacity(chunks.len()),
        };
        for text in chunks {
            let embedding = index.embed(&text);
            index.entries.push(VectorStoreEntry { text, embedding });
        }
        index
    }

    /// L2-normalized term-frequency vector for `text`. Tokens outside the
    /// vocabulary are ignored; text with no known tokens yields all zeros.
    pub fn embed(&self, text: &str) -> Array1<f32> {
        let mut vector = Array1::<f32>::zeros(self.vocabulary.len());
        for token in tokenize(text) {
            if let Some(position) = self.vocabulary.position(&token) {
                vector[position] += 1.0;
            }
        }

        let magnitude = vector.dot(&vector).sqrt();
        if magnitude > 0.0 {
            vector /= magnitude;
        }
        vector
    }

    /// Scores every entry against `query` and returns the best `top_k`,
    /// highest first. Equal scores keep corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let query_embedding = self.embed(query);

        let mut scored: Vec<(f32, &VectorStoreEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_embedding, &entry.embedding), entry))
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredChunk {
                text: entry.text.clone(),
                score,
            })
            .collect()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn entries(&self) -> &[VectorStoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both vectors are unit length (or all zero), so the dot product is the cosine.
fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    a.dot(b)
}
