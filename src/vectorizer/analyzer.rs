use rayon::prelude::*;

use super::term::TermFrequency;

/// Minimum token length in characters; single characters are dropped
pub const MIN_TOKEN_LEN: usize = 2;

/// Splits raw text into lower-cased word tokens and their n-grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analyzer {
    max_ngram: usize,
}

impl Analyzer {
    pub fn new(max_ngram: usize) -> Self {
        Self { max_ngram: max_ngram.max(1) }
    }

    /// Word tokens: runs of alphanumeric or `_` characters with at least
    /// `MIN_TOKEN_LEN` characters.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|tok| tok.chars().count() >= MIN_TOKEN_LEN)
            .map(|tok| tok.to_lowercase())
            .collect()
    }

    /// Terms of one document, unigrams first, then each higher order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let tokens = Self::tokenize(text);
        let mut terms = tokens.clone();
        for n in 2..=self.max_ngram {
            terms.extend(tokens.windows(n).map(|gram| gram.join(" ")));
        }
        terms
    }

    pub fn analyze(&self, text: &str) -> TermFrequency {
        let terms = self.terms(text);
        TermFrequency::from(terms.as_slice())
    }

    /// Analyze a whole column in parallel, preserving row order.
    /// Missing cells analyze as the empty document.
    pub fn analyze_batch<S>(&self, rows: &[Option<S>]) -> Vec<TermFrequency>
    where
        S: AsRef<str> + Sync,
    {
        rows.par_iter()
            .map(|row| match row {
                Some(text) => self.analyze(text.as_ref()),
                None => TermFrequency::new(),
            })
            .collect()
    }
}
