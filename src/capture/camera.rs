// camera.rs — Snapshot sources. Each capture reads raw picture bytes,
// downscales, JPEG-encodes at a fixed quality and base64-encodes them.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, GenericImageView};
use std::path::PathBuf;
use tokio::process::Command;

use super::{Camera, CaptureError, ImagePayload};

// ── Encoding ────────────────────────────────────────────────────────────

/// Decode any supported picture, shrink it to `max_width`, and return it as a
/// base64 JPEG at `jpeg_quality` (1–100).
pub fn encode_jpeg(raw: &[u8], max_width: u32, jpeg_quality: u8) -> Result<ImagePayload, CaptureError> {
    let img = image::load_from_memory(raw).map_err(|e| CaptureError::Decode(e.to_string()))?;

    let img = if img.width() > max_width {
        let ratio = max_width as f64 / img.width() as f64;
        let new_h = ((img.height() as f64 * ratio).round() as u32).max(1);
        img.resize_exact(max_width, new_h, imageops::FilterType::Triangle)
    } else {
        img
    };

    let (w, h) = img.dimensions();

    let mut jpeg_buf: Vec<u8> = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_buf, jpeg_quality.clamp(1, 100))
        .encode(img.to_rgb8().as_raw(), w, h, image::ExtendedColorType::Rgb8)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(ImagePayload {
        base64: BASE64.encode(&jpeg_buf),
        width: w,
        height: h,
    })
}

// ── CommandCamera ───────────────────────────────────────────────────────

/// Runs a snapshot program and reads the picture from its stdout,
/// e.g. `fswebcam --no-banner -` or `libcamera-still -n -o -`.
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    max_width: u32,
    jpeg_quality: u8,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, args: Vec<String>, max_width: u32, jpeg_quality: u8) -> Self {
        Self {
            program: program.into(),
            args,
            max_width,
            jpeg_quality,
        }
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture(&self) -> Result<ImagePayload, CaptureError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptureError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::Unavailable(format!("{} produced no image", self.program)));
        }

        encode_jpeg(&output.stdout, self.max_width, self.jpeg_quality)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

// ── FileCamera ──────────────────────────────────────────────────────────

/// Re-reads the same picture file on every capture.
pub struct FileCamera {
    path: PathBuf,
    label: String,
    max_width: u32,
    jpeg_quality: u8,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>, max_width: u32, jpeg_quality: u8) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self {
            path,
            label,
            max_width,
            jpeg_quality,
        }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn capture(&self) -> Result<ImagePayload, CaptureError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaptureError::Unavailable(format!("{} does not exist", self.label)));
            }
            Err(e) => return Err(e.into()),
        };
        encode_jpeg(&raw, self.max_width, self.jpeg_quality)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::Cursor;

    /// Helper: a solid-colour image encoded as PNG bytes.
    fn solid_png(r: u8, g: u8, b: u8, w: u32, h: u32) -> Vec<u8> {
        let mut img = RgbaImage::new(w, h);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([r, g, b, 255]);
        }
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn decode(payload: &ImagePayload) -> DynamicImage {
        let bytes = BASE64.decode(&payload.base64).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn wide_pictures_are_downscaled() {
        let payload = encode_jpeg(&solid_png(10, 200, 30, 400, 200), 100, 25).unwrap();
        assert_eq!((payload.width, payload.height), (100, 50));
        let img = decode(&payload);
        assert_eq!(img.dimensions(), (100, 50));
    }

    #[test]
    fn narrow_pictures_keep_their_size() {
        let payload = encode_jpeg(&solid_png(0, 0, 0, 64, 48), 1024, 25).unwrap();
        assert_eq!((payload.width, payload.height), (64, 48));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = encode_jpeg(b"definitely not an image", 1024, 25).unwrap_err();
        assert!(matches!(err, CaptureError::Decode(_)));
    }

    #[tokio::test]
    async fn file_camera_reads_the_file_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.png");
        std::fs::write(&path, solid_png(255, 255, 255, 32, 32)).unwrap();

        let camera = FileCamera::new(&path, 1024, 25);
        let first = camera.capture().await.unwrap();
        assert_eq!(first.width, 32);

        std::fs::write(&path, solid_png(0, 0, 0, 16, 8)).unwrap();
        let second = camera.capture().await.unwrap();
        assert_eq!((second.width, second.height), (16, 8));
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let camera = FileCamera::new(dir.path().join("nope.jpg"), 1024, 25);
        assert!(matches!(
            camera.capture().await,
            Err(CaptureError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let camera = CommandCamera::new("glance-no-such-snapshot-tool", vec![], 1024, 25);
        assert!(matches!(
            camera.capture().await,
            Err(CaptureError::Unavailable(_))
        ));
    }
}
