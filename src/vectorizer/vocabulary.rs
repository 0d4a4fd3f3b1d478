use std::collections::HashSet;

use ahash::RandomState;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Term to id mapping.
/// The id of a term is its insertion index, so ids are dense `0..V` and
/// never renumbered. `stop_words` holds terms a fit decided to exclude.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: IndexSet<String, RandomState>,
    stop_words: HashSet<String, RandomState>,
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.terms.iter().eq(other.terms.iter()) && self.stop_words == other.stop_words
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            terms: IndexSet::with_hasher(RandomState::new()),
            stop_words: HashSet::with_hasher(RandomState::new()),
        }
    }

    /// Build from terms in id order; duplicates keep their first id.
    pub fn from_terms<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut vocab = Self::new();
        for term in terms {
            vocab.insert(term.into());
        }
        vocab
    }

    /// Insert a term, returning its id. Known terms keep their id.
    pub fn insert(&mut self, term: String) -> usize {
        self.terms.insert_full(term).0
    }

    pub fn add_stop_word(&mut self, term: String) {
        if !self.terms.contains(term.as_str()) {
            self.stop_words.insert(term);
        }
    }

    #[inline]
    pub fn id(&self, term: &str) -> Option<usize> {
        self.terms.get_index_of(term)
    }

    #[inline]
    pub fn term(&self, id: usize) -> Option<&str> {
        self.terms.get_index(id).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    pub fn is_stop_word(&self, term: &str) -> bool {
        self.stop_words.contains(term)
    }

    /// Terms in id order
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn stop_words(&self) -> impl Iterator<Item = &str> {
        self.stop_words.iter().map(String::as_str)
    }

    /// Merge a vocabulary freshly fit on a new batch into this one.
    ///
    /// Known terms keep their ids, unseen terms are appended in the batch's
    /// first-seen order. A term the batch admitted is no longer a stop word.
    ///
    /// # Returns
    /// * `(Vocabulary, Vec<usize>)` - merged vocabulary and, indexed by the
    ///   batch's local id, the merged id of each batch term
    pub fn merge(&self, batch: &Vocabulary) -> (Vocabulary, Vec<usize>) {
        let mut merged = self.clone();
        let mut local_to_global = Vec::with_capacity(batch.len());
        for term in batch.terms() {
            merged.stop_words.remove(term);
            let id = match merged.id(term) {
                Some(id) => id,
                None => merged.insert(term.to_string()),
            };
            local_to_global.push(id);
        }
        (merged, local_to_global)
    }
}
