use crate::embedding::Embedding;
use crate::error::SessionError;
use crate::label::{ClassificationResult, Label};
use crate::KNN_K;
use log::trace;
use ndarray::Array1;

/// Accumulates labelled embeddings and classifies new ones against them.
pub trait ExampleStore {
    /// Append-only; examples are never removed or changed.
    fn add_example(&mut self, embedding: Embedding, label: Label);

    fn predict_class(&self, embedding: &Embedding) -> Result<ClassificationResult, SessionError>;

    fn len(&self) -> usize;

    fn count(&self, label: Label) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine-similarity k-nearest-neighbour store.
#[derive(Debug)]
pub struct KnnStore {
    k: usize,
    examples: Vec<(Array1<f32>, Label)>,
    counts: [usize; Label::COUNT],
}

impl Default for KnnStore {
    fn default() -> Self {
        KnnStore::new(KNN_K)
    }
}

impl KnnStore {
    pub fn new(k: usize) -> Self {
        KnnStore {
            k: k.max(1),
            examples: vec![],
            counts: [0; Label::COUNT],
        }
    }

    fn dimensions(&self) -> Option<usize> {
        self.examples.first().map(|(v, _)| v.len())
    }
}

impl ExampleStore for KnnStore {
    fn add_example(&mut self, embedding: Embedding, label: Label) {
        self.counts[label.index()] += 1;
        self.examples.push((embedding.normalized(), label));
    }

    fn predict_class(&self, embedding: &Embedding) -> Result<ClassificationResult, SessionError> {
        let dims = self.dimensions().ok_or(SessionError::ClassifierPrecondition)?;
        if embedding.len() != dims {
            return Err(SessionError::EmbeddingExtraction(format!(
                "query has {} dimensions, examples have {}",
                embedding.len(),
                dims
            )));
        }

        let query = embedding.normalized();
        let mut scored: Vec<(f32, Label)> = self
            .examples
            .iter()
            .map(|(example, label)| (example.dot(&query), *label))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let k = self.k.min(scored.len());
        let mut votes = [0usize; Label::COUNT];
        for (_, label) in &scored[..k] {
            votes[label.index()] += 1;
        }

        let nearest = scored[0].1;
        let label = if votes[Label::Touched.index()] == votes[Label::NotTouched.index()] {
            nearest
        } else if votes[Label::Touched.index()] > votes[Label::NotTouched.index()] {
            Label::Touched
        } else {
            Label::NotTouched
        };

        let result = ClassificationResult::new(
            label,
            votes[Label::NotTouched.index()] as f32 / k as f32,
            votes[Label::Touched.index()] as f32 / k as f32,
        );
        trace!("Nearest similarity {:.3}, k {}, result {:?}", scored[0].0, k, result);
        Ok(result)
    }

    fn len(&self) -> usize {
        self.examples.len()
    }

    fn count(&self, label: Label) -> usize {
        self.counts[label.index()]
    }
}
