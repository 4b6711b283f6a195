use crate::embedding::{Embedder, Embedding};
use crate::error::SessionError;
use crate::frame::Frame;
use log::{debug, info};
use ndarray::{Array1, Array4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::PathBuf;

pub const DEFAULT_INPUT_SIZE: usize = 224;

/// Image feature extractor backed by an ONNX model, e.g. a MobileNet with its
/// classification head removed. Input is NCHW f32 in [0,1]; the first output is
/// flattened into the embedding.
pub struct OnnxEmbedder {
    model_path: PathBuf,
    input_size: usize,
    session: Option<Session>,
}

impl OnnxEmbedder {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        OnnxEmbedder {
            model_path: model_path.into(),
            input_size: DEFAULT_INPUT_SIZE,
            session: None,
        }
    }

    pub fn with_input_size(mut self, input_size: usize) -> Self {
        self.input_size = input_size;
        self
    }

    fn to_input(&self, frame: &Frame) -> Array4<f32> {
        let (height, width) = (frame.height(), frame.width());
        let size = self.input_size;
        // nearest-neighbour resize straight into NCHW
        Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            let sy = y * height / size;
            let sx = x * width / size;
            frame.pixels[[sy, sx, c]] as f32 / 255.0
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn load(&mut self) -> Result<(), SessionError> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.with_inter_threads(1))
            .and_then(|b| b.commit_from_file(&self.model_path))
            .map_err(|e| SessionError::ModelLoad(format!("{}: {}", self.model_path.display(), e)))?;
        info!("Loaded embedding model {:?}", self.model_path);
        self.session = Some(session);
        Ok(())
    }

    fn infer(&mut self, frame: &Frame) -> Result<Embedding, SessionError> {
        if frame.is_empty() {
            return Err(SessionError::EmbeddingExtraction("empty frame".into()));
        }
        let input = self.to_input(frame);
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SessionError::EmbeddingExtraction("model not loaded".into()))?;
        let extraction = |e: ort::Error| SessionError::EmbeddingExtraction(e.to_string());

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| SessionError::EmbeddingExtraction("model has no inputs".into()))?;
        let outputs = session
            .run(ort::inputs![input_name.as_str() => input.view()].map_err(extraction)?)
            .map_err(extraction)?;
        let tensor = outputs[0].try_extract_tensor::<f32>().map_err(extraction)?;
        let values: Array1<f32> = tensor.iter().copied().collect();
        debug!("Model embedding with {} dimensions", values.len());
        Ok(Embedding::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_load_error() {
        let mut embedder = OnnxEmbedder::new("does/not/exist.onnx");
        assert!(matches!(embedder.load(), Err(SessionError::ModelLoad(_))));
    }

    #[test]
    fn input_is_resized_and_scaled() {
        let embedder = OnnxEmbedder::new("unused.onnx").with_input_size(8);
        let input = embedder.to_input(&Frame::filled(3, 5, [255, 0, 51]));
        assert_eq!(input.shape(), &[1, 3, 8, 8]);
        assert_eq!(input[[0, 0, 7, 7]], 1.0);
        assert_eq!(input[[0, 1, 0, 0]], 0.0);
        assert!((input[[0, 2, 4, 4]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn infer_before_load_fails() {
        let mut embedder = OnnxEmbedder::new("unused.onnx");
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        assert!(matches!(embedder.infer(&frame), Err(SessionError::EmbeddingExtraction(_))));
    }
}
