//! Extractor Registry (§4.2). Generalizes the teacher's `SourceManager`
//! (ordered plugin list, first-match dispatch) to the descriptor-returning
//! `Extractor` trait.

use crate::normalizer::Normalized;

use super::plugin::Extractor;

pub struct Registry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Registry {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Returns the first extractor (in registration order) that claims
    /// `target` (§4.2).
    pub fn dispatch(&self, target: &Normalized) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.matches(target))
            .map(|b| b.as_ref())
    }
}
