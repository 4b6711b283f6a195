use crate::error::SessionError;
use log::{debug, info, warn};
use ndarray::Array3;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One RGB picture, laid out height x width x 3.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pixels: Array3<u8>,
}

impl Frame {
    pub fn new(pixels: Array3<u8>) -> Self {
        Frame { pixels }
    }

    /// Single-colour frame, handy for synthetic sources.
    pub fn filled(height: usize, width: usize, rgb: [u8; 3]) -> Self {
        Frame {
            pixels: Array3::from_shape_fn((height, width, 3), |(_, _, c)| rgb[c]),
        }
    }

    pub fn height(&self) -> usize {
        self.pixels.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.pixels.shape()[1]
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn from_rgb_image(image: image::RgbImage) -> Result<Self, SessionError> {
        let (width, height) = image.dimensions();
        Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())
            .map(Frame::new)
            .map_err(|e| SessionError::FrameCapture(e.to_string()))
    }
}

/// Where frames come from: a camera, a file replay, a test fixture.
pub trait FrameSource {
    /// Opens the source. Succeeds once the first frame is decodable.
    fn acquire(&mut self) -> Result<(), SessionError>;

    /// The frame visible right now.
    fn current_frame(&mut self) -> Result<Frame, SessionError>;
}

/// Replays the images of one directory in file-name order, wrapping around.
#[derive(Debug)]
pub struct DirectoryFrameSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
}

impl DirectoryFrameSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryFrameSource {
            dir: dir.into(),
            files: vec![],
            position: 0,
        }
    }

    /// Points the source at another directory; takes effect on the next `acquire`.
    pub fn switch_to(&mut self, dir: impl Into<PathBuf>) {
        self.dir = dir.into();
        self.files.clear();
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn list_images(&self) -> Result<Vec<PathBuf>, SessionError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => SessionError::PermissionDenied(format!("{}: {}", self.dir.display(), e)),
            _ => SessionError::DeviceUnavailable(format!("{}: {}", self.dir.display(), e)),
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

fn decode(path: &Path) -> Result<Frame, SessionError> {
    let image = image::open(path).map_err(|e| SessionError::FrameCapture(format!("{}: {}", path.display(), e)))?;
    Frame::from_rgb_image(image.to_rgb8())
}

impl FrameSource for DirectoryFrameSource {
    fn acquire(&mut self) -> Result<(), SessionError> {
        let files = self.list_images()?;
        let first = files
            .first()
            .ok_or_else(|| SessionError::DeviceUnavailable(format!("no images in {}", self.dir.display())))?;
        if let Err(e) = decode(first) {
            warn!("First frame {:?} not decodable: {}", first, e);
            return Err(SessionError::DeviceUnavailable(e.to_string()));
        }
        info!("Frame source {:?} ready with {} frames", self.dir, files.len());
        self.files = files;
        self.position = 0;
        Ok(())
    }

    fn current_frame(&mut self) -> Result<Frame, SessionError> {
        if self.files.is_empty() {
            return Err(SessionError::FrameCapture("frame source not acquired".into()));
        }
        let path = &self.files[self.position % self.files.len()];
        self.position = (self.position + 1) % self.files.len();
        debug!("Frame {:?}", path);
        decode(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_png(dir: &Path, name: &str, rgb: [u8; 3]) {
        let image = image::RgbImage::from_pixel(4, 3, image::Rgb(rgb));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn replays_images_in_name_order() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "b.png", [0, 255, 0]);
        write_png(dir.path(), "a.png", [255, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = DirectoryFrameSource::new(dir.path());
        source.acquire().unwrap();
        assert_eq!(source.len(), 2);

        let first = source.current_frame().unwrap();
        assert_eq!((first.height(), first.width()), (3, 4));
        assert_eq!(first.pixels[[0, 0, 0]], 255);
        let second = source.current_frame().unwrap();
        assert_eq!(second.pixels[[0, 0, 1]], 255);
        let wrapped = source.current_frame().unwrap();
        assert_eq!(wrapped, first);
    }

    #[test]
    fn missing_directory_is_device_unavailable() {
        let dir = tempdir().unwrap();
        let mut source = DirectoryFrameSource::new(dir.path().join("nope"));
        assert!(matches!(source.acquire(), Err(SessionError::DeviceUnavailable(_))));
    }

    #[test]
    fn empty_directory_is_device_unavailable() {
        let dir = tempdir().unwrap();
        let mut source = DirectoryFrameSource::new(dir.path());
        assert!(matches!(source.acquire(), Err(SessionError::DeviceUnavailable(_))));
    }

    #[test]
    fn reading_before_acquire_fails() {
        let mut source = DirectoryFrameSource::new("unused");
        assert!(matches!(source.current_frame(), Err(SessionError::FrameCapture(_))));
    }

    #[test]
    fn filled_frame_has_requested_colour() {
        let frame = Frame::filled(2, 5, [1, 2, 3]);
        assert_eq!((frame.height(), frame.width()), (2, 5));
        assert_eq!(frame.pixels[[1, 4, 2]], 3);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        write_png(&locked, "a.png", [1, 2, 3]);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores directory permissions
        let readable = std::fs::read_dir(&locked).is_ok();
        let result = DirectoryFrameSource::new(&locked).acquire();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }
        assert!(matches!(result, Err(SessionError::PermissionDenied(_))));
        assert!(result.unwrap_err().is_startup_failure());
    }
}
