use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::knowledge::KnowledgeItem;
use crate::utils::preview;
use crate::vector_db::{ScoredChunk, VectorIndex};

pub const DEFAULT_TOP_K: usize = 2;

/// Top-K retrieval over a knowledge corpus.
///
/// The index is built on first use and reused for the lifetime of the
/// retriever. Concurrent first calls still build it only once.
pub struct Retriever {
    corpus: Vec<KnowledgeItem>,
    index: OnceLock<VectorIndex>,
    builds: AtomicUsize,
}

impl Retriever {
    pub fn new(corpus: Vec<KnowledgeItem>) -> Self {
        Retriever {
            corpus,
            index: OnceLock::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// Wraps an index that has already been built.
    pub fn with_index(index: VectorIndex) -> Self {
        Retriever {
            corpus: Vec::new(),
            index: OnceLock::from(index),
            builds: AtomicUsize::new(0),
        }
    }

    /// Builds the index if needed. Calling it again is a no-op.
    pub fn initialize(&self) -> &VectorIndex {
        self.index.get_or_init(|| {
            let index = VectorIndex::build(&self.corpus);
            self.builds.fetch_add(1, Ordering::SeqCst);
            info!(
                "RAG initialized with {} knowledge entries ({} terms)",
                index.len(),
                index.vocabulary().len()
            );
            index
        })
    }

    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<String> {
        self.retrieve_scored(query, top_k)
            .into_iter()
            .map(|hit| hit.text)
            .collect()
    }

    /// Like [`Retriever::retrieve`], keeping the similarity scores.
    pub fn retrieve_scored(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let hits = self.initialize().search(query, top_k);

        debug!(
            "RAG retrieved: {}",
            hits.iter()
                .map(|hit| format!("[{:.3}] {}", hit.score, preview(&hit.text, 50)))
                .collect::<Vec<_>>()
                .join(" | ")
        );
        hits
    }

    /// Number of times the index has been built by this retriever (0 or 1).
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn scenario_corpus() -> Vec<KnowledgeItem> {
        vec![
            KnowledgeItem::new("Pump overheating", ["blocked filter"], ["clean filter"]),
            KnowledgeItem::new("Low oil", ["oil leak"], ["refill oil"]),
        ]
    }

    #[test]
    fn test_retrieve_overheating_scenario() {
        let retriever = Retriever::new(scenario_corpus());
        let results = retriever.retrieve("pump is overheating", 1);
        assert_eq!(
            results,
            vec!["Issue: Pump overheating\nCauses: blocked filter\nActions: clean filter\n"]
        );
    }

    #[test]
    fn test_lazy_build_happens_once() {
        let retriever = Retriever::new(scenario_corpus());
        assert_eq!(retriever.build_count(), 0);

        for _ in 0..5 {
            retriever.retrieve("oil leak", DEFAULT_TOP_K);
        }
        retriever.initialize();
        assert_eq!(retriever.build_count(), 1);
    }

    #[test]
    fn test_concurrent_first_calls_build_once() {
        let retriever = Arc::new(Retriever::new(scenario_corpus()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let retriever = Arc::clone(&retriever);
                thread::spawn(move || retriever.retrieve("refill oil", 1))
            })
            .collect();

        for handle in handles {
            let results = handle.join().unwrap();
            assert!(results[0].starts_with("Issue: Low oil"));
        }
        assert_eq!(retriever.build_count(), 1);
    }

    #[test]
    fn test_independent_retrievers() {
        let a = Retriever::new(scenario_corpus());
        let b = Retriever::new(vec![KnowledgeItem::new(
            "Excessive power consumption",
            ["clogged exhaust"],
            ["clean exhaust"],
        )]);

        assert!(a.retrieve("exhaust", 1)[0].starts_with("Issue: Pump overheating"));
        assert!(b.retrieve("exhaust", 1)[0].starts_with("Issue: Excessive power"));
        assert_eq!(a.initialize().vocabulary().position("exhaust"), None);
    }

    #[test]
    fn test_retrieve_empty_inputs() {
        let empty = Retriever::new(Vec::new());
        assert!(empty.retrieve("pump overheating", 3).is_empty());

        let retriever = Retriever::new(scenario_corpus());
        assert_eq!(retriever.retrieve("", 5).len(), 2);
        assert!(retriever.retrieve("pump", 0).is_empty());
    }

    #[test]
    fn test_with_index_skips_lazy_build() {
        let retriever = Retriever::with_index(VectorIndex::build(&scenario_corpus()));
        let scored = retriever.retrieve_scored("low oil", 2);
        assert_eq!(retriever.build_count(), 0);
        assert!(scored[0].score > scored[1].score);
        assert!(scored[0].text.starts_with("Issue: Low oil"));
    }
}
