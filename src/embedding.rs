use crate::error::SessionError;
use crate::frame::Frame;
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};

pub const PIXEL_GRID: usize = 16;

/// Feature vector extracted from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Array1<f32>);

impl Embedding {
    pub fn new(values: Array1<f32>) -> Self {
        Embedding(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &Array1<f32> {
        &self.0
    }

    /// Unit-length copy; a zero vector stays zero.
    pub fn normalized(&self) -> Array1<f32> {
        let norm = self.0.dot(&self.0).sqrt();
        if norm > f32::EPSILON {
            &self.0 / norm
        } else {
            self.0.clone()
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding(Array1::from(values))
    }
}

/// Maps frames to embeddings.
pub trait Embedder {
    /// Prepares the model. Called once by `Session::start`.
    fn load(&mut self) -> Result<(), SessionError>;

    fn infer(&mut self, frame: &Frame) -> Result<Embedding, SessionError>;
}

/// Thumbnail embedder: grayscale, average-pooled to a `grid x grid` block,
/// mean-centred and scaled to unit length.
#[derive(Debug)]
pub struct PixelEmbedder {
    grid: usize,
    loaded: bool,
}

impl Default for PixelEmbedder {
    fn default() -> Self {
        PixelEmbedder::new(PIXEL_GRID)
    }
}

impl PixelEmbedder {
    pub fn new(grid: usize) -> Self {
        PixelEmbedder { grid, loaded: false }
    }

    pub fn dimensions(&self) -> usize {
        self.grid * self.grid
    }

    fn grayscale(frame: &Frame) -> Array2<f32> {
        frame
            .pixels
            .mapv(f32::from)
            .map_axis(Axis(2), |rgb| 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2])
    }

    fn pool(&self, gray: &Array2<f32>) -> Array1<f32> {
        let (height, width) = gray.dim();
        let mut pooled = Array1::<f32>::zeros(self.dimensions());
        for gy in 0..self.grid {
            let y0 = gy * height / self.grid;
            let y1 = ((gy + 1) * height / self.grid).max(y0 + 1).min(height);
            for gx in 0..self.grid {
                let x0 = gx * width / self.grid;
                let x1 = ((gx + 1) * width / self.grid).max(x0 + 1).min(width);
                let cell = gray.slice(ndarray::s![y0..y1, x0..x1]);
                pooled[gy * self.grid + gx] = cell.mean().unwrap_or(0.0);
            }
        }
        pooled
    }
}

impl Embedder for PixelEmbedder {
    fn load(&mut self) -> Result<(), SessionError> {
        if self.grid == 0 {
            return Err(SessionError::ModelLoad("pixel grid must be at least 1".into()));
        }
        self.loaded = true;
        info!("Pixel embedder ready, {} dimensions", self.dimensions());
        Ok(())
    }

    fn infer(&mut self, frame: &Frame) -> Result<Embedding, SessionError> {
        if !self.loaded {
            return Err(SessionError::EmbeddingExtraction("embedder not loaded".into()));
        }
        if frame.is_empty() {
            return Err(SessionError::EmbeddingExtraction("empty frame".into()));
        }
        let mut pooled = self.pool(&Self::grayscale(frame));
        let mean = pooled.mean().unwrap_or(0.0);
        pooled.mapv_inplace(|v| v - mean);
        let embedding = Embedding::new(pooled);
        debug!("Extracted {} dim embedding from {}x{} frame", embedding.len(), frame.width(), frame.height());
        Ok(Embedding::new(embedding.normalized()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn split_frame(left_bright: bool) -> Frame {
        Frame::new(Array3::from_shape_fn((32, 32, 3), |(_, x, _)| {
            let left = x < 16;
            if left == left_bright { 250 } else { 10 }
        }))
    }

    #[test]
    fn infer_requires_load() {
        let mut embedder = PixelEmbedder::new(4);
        let frame = Frame::filled(8, 8, [1, 1, 1]);
        assert!(matches!(embedder.infer(&frame), Err(SessionError::EmbeddingExtraction(_))));
    }

    #[test]
    fn zero_grid_fails_to_load() {
        let mut embedder = PixelEmbedder::new(0);
        assert!(matches!(embedder.load(), Err(SessionError::ModelLoad(_))));
    }

    #[test]
    fn embeddings_are_unit_length_and_distinguish_layouts() {
        let mut embedder = PixelEmbedder::new(4);
        embedder.load().unwrap();
        let a = embedder.infer(&split_frame(true)).unwrap();
        let b = embedder.infer(&split_frame(false)).unwrap();
        assert_eq!(a.len(), 16);
        assert!((a.values().dot(a.values()) - 1.0).abs() < 1e-4);
        assert!(a.values().dot(b.values()) < -0.9);
        let again = embedder.infer(&split_frame(true)).unwrap();
        assert!(a.values().dot(again.values()) > 0.999);
    }

    #[test]
    fn frames_smaller_than_grid_still_embed() {
        let mut embedder = PixelEmbedder::new(8);
        embedder.load().unwrap();
        let embedding = embedder.infer(&Frame::filled(3, 2, [9, 9, 9])).unwrap();
        assert_eq!(embedding.len(), 64);
    }

    #[test]
    fn normalizing_zero_vector_stays_zero() {
        let zero = Embedding::from(vec![0.0, 0.0]);
        assert_eq!(zero.normalized(), Array1::<f32>::zeros(2));
    }
}
