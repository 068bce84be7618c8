//! Colour-statistics image features.
//!
//! Images are decoded (format sniffed from content), converted to 8-bit
//! RGB and resized to a fixed 64×64 grid with a Catmull-Rom kernel. The
//! raw feature vector is laid out as:
//!
//! | Range     | Len | Content                                             |
//! |-----------|-----|-----------------------------------------------------|
//! | 0..96     | 96  | 32-bin histograms of R, G, B (pixel counts)         |
//! | 96..108   | 12  | mean/std per channel, mean/std/min/max overall, h, w |
//! | 108..156  | 48  | 4×4 block means of R, G, B in row-major order        |
//! | 156..208  | 52  | zero fill                                           |
//!
//! The result is normalized and padded by [`EmbeddingComposer`].

use std::path::Path;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbImage;
use mirador_core::{Error, Result};

use crate::compose::EmbeddingComposer;
use crate::types::{Embedding, ImageSource};

/// Edge length of the resized grid.
pub const RESIZE_EDGE: u32 = 64;

/// Histogram bins per channel.
pub const HISTOGRAM_BINS: usize = 32;

/// Number of summary statistics.
pub const STAT_COUNT: usize = 12;

/// Texture blocks per side.
pub const TEXTURE_GRID: u32 = 4;

/// Length of the zero-filled texture section.
pub const TEXTURE_LEN: usize = 100;

/// Length of the raw image feature vector.
pub const IMAGE_FEATURE_LEN: usize = 3 * HISTOGRAM_BINS + STAT_COUNT + TEXTURE_LEN;

const BIN_WIDTH: usize = 256 / HISTOGRAM_BINS;

// ============================================================================
// Raw features
// ============================================================================

/// Decode `bytes` and compute the 208 raw (unnormalized) features.
pub fn raw_features(bytes: &[u8]) -> Result<Vec<f64>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::extraction_with_source("Failed to decode image", e))?;
    let resized = imageops::resize(
        &decoded.to_rgb8(),
        RESIZE_EDGE,
        RESIZE_EDGE,
        FilterType::CatmullRom,
    );
    Ok(features_from_rgb(&resized))
}

fn features_from_rgb(img: &RgbImage) -> Vec<f64> {
    let mut features = Vec::with_capacity(IMAGE_FEATURE_LEN);
    features.extend(histograms(img));
    features.extend(statistics(img));
    features.extend(texture(img));
    features
}

fn histograms(img: &RgbImage) -> Vec<f64> {
    let mut counts = vec![0u32; 3 * HISTOGRAM_BINS];
    for pixel in img.pixels() {
        for (channel, &value) in pixel.0.iter().enumerate() {
            counts[channel * HISTOGRAM_BINS + usize::from(value) / BIN_WIDTH] += 1;
        }
    }
    counts.into_iter().map(f64::from).collect()
}

/// Population mean and standard deviation.
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (sum, n) = values.clone().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    (mean, variance.sqrt())
}

fn statistics(img: &RgbImage) -> Vec<f64> {
    let channel = |c: usize| img.pixels().map(move |p| f64::from(p.0[c]));
    let all = || img.pixels().flat_map(|p| p.0).map(f64::from);

    let (mean_r, std_r) = mean_std(channel(0));
    let (mean_g, std_g) = mean_std(channel(1));
    let (mean_b, std_b) = mean_std(channel(2));
    let (mean_all, std_all) = mean_std(all());
    let min = all().fold(f64::INFINITY, f64::min);
    let max = all().fold(f64::NEG_INFINITY, f64::max);

    vec![
        mean_r,
        std_r,
        mean_g,
        std_g,
        mean_b,
        std_b,
        mean_all,
        std_all,
        if min.is_finite() { min } else { 0.0 },
        if max.is_finite() { max } else { 0.0 },
        f64::from(img.height()),
        f64::from(img.width()),
    ]
}

fn texture(img: &RgbImage) -> Vec<f64> {
    let (w, h) = img.dimensions();
    let mut blocks = Vec::with_capacity(TEXTURE_LEN);

    for bi in 0..TEXTURE_GRID {
        for bj in 0..TEXTURE_GRID {
            let rows = bi * h / TEXTURE_GRID..(bi + 1) * h / TEXTURE_GRID;
            let cols = bj * w / TEXTURE_GRID..(bj + 1) * w / TEXTURE_GRID;

            let mut sums = [0.0f64; 3];
            let mut count = 0usize;
            for y in rows {
                for x in cols.clone() {
                    let p = img.get_pixel(x, y);
                    for (sum, &v) in sums.iter_mut().zip(p.0.iter()) {
                        *sum += f64::from(v);
                    }
                    count += 1;
                }
            }
            let count = count.max(1) as f64;
            blocks.extend(sums.iter().map(|s| s / count));
        }
    }

    blocks.resize(TEXTURE_LEN, 0.0);
    blocks
}

// ============================================================================
// Extractor
// ============================================================================

/// Extracts embeddings from encoded images.
///
/// The synchronous [`extract`](Self::extract) does the CPU work; the async
/// methods move decoding onto the blocking pool and bound both the file
/// read and the decode by the configured timeout.
#[derive(Debug, Clone, Copy)]
pub struct ImageExtractor {
    composer: EmbeddingComposer,
    timeout: Duration,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self::new(EmbeddingComposer::default())
    }
}

impl ImageExtractor {
    /// Create an extractor with a 30 second deadline.
    pub fn new(composer: EmbeddingComposer) -> Self {
        Self {
            composer,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the read/decode deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Embed encoded image bytes on the current thread.
    pub fn extract(&self, bytes: &[u8]) -> Result<Embedding> {
        let raw = raw_features(bytes)?;
        Ok(self.composer.compose(&raw))
    }

    /// Embed encoded image bytes on the blocking pool.
    pub async fn extract_bytes(&self, bytes: Vec<u8>) -> Result<Embedding> {
        let extractor = *self;
        let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(Error::extraction_with_source(
                "Image decode task failed",
                join,
            )),
            Err(_) => Err(Error::extraction_timeout("image decode", self.timeout)),
        }
    }

    /// Read and embed the image at `path`.
    pub async fn extract_path(&self, path: &Path) -> Result<Embedding> {
        let bytes = match tokio::time::timeout(self.timeout, tokio::fs::read(path)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                return Err(Error::extraction_with_source(
                    format!("Failed to read {}", path.display()),
                    e,
                ));
            }
            Err(_) => {
                return Err(Error::extraction_timeout(
                    format!("read {}", path.display()),
                    self.timeout,
                ));
            }
        };
        self.extract_bytes(bytes).await
    }

    /// Embed an image from a path or in-memory bytes.
    pub async fn extract_source(&self, source: &ImageSource) -> Result<Embedding> {
        match source {
            ImageSource::Path(path) => self.extract_path(path).await,
            ImageSource::Bytes(bytes) => self.extract_bytes(bytes.clone()).await,
        }
    }
}

/// Embed encoded image bytes at the deployed dimension.
pub fn extract_image(bytes: &[u8]) -> Result<Embedding> {
    ImageExtractor::default().extract(bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    fn solid_png(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
        encode(RgbImage::from_pixel(w, h, Rgb(rgb)), ImageFormat::Png)
    }

    fn gradient_png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, ((x + y) % 256) as u8])
        });
        encode(img, ImageFormat::Png)
    }

    // ------------------------------------------------------------------------
    // Raw feature layout
    // ------------------------------------------------------------------------

    #[test]
    fn test_raw_features_length() {
        let raw = raw_features(&gradient_png(100, 50)).unwrap();
        assert_eq!(raw.len(), IMAGE_FEATURE_LEN);
        assert_eq!(IMAGE_FEATURE_LEN, 208);
    }

    #[test]
    fn test_uniform_image_histogram_single_bin() {
        let raw = raw_features(&solid_png(64, 64, [200, 16, 88])).unwrap();
        let pixels = 64.0 * 64.0;

        assert_eq!(raw[200 / 8], pixels);
        assert_eq!(raw[32 + 16 / 8], pixels);
        assert_eq!(raw[64 + 88 / 8], pixels);
        assert_eq!(raw[..96].iter().filter(|&&v| v != 0.0).count(), 3);
    }

    #[test]
    fn test_uniform_image_statistics() {
        let raw = raw_features(&solid_png(64, 64, [200, 16, 88])).unwrap();
        let stats = &raw[96..108];

        assert_eq!(stats[0], 200.0);
        assert_eq!(stats[1], 0.0);
        assert_eq!(stats[2], 16.0);
        assert_eq!(stats[3], 0.0);
        assert_eq!(stats[4], 88.0);
        assert_eq!(stats[5], 0.0);
        assert!((stats[6] - 304.0 / 3.0).abs() < 1e-9);
        assert!(stats[7] > 0.0);
        assert_eq!(stats[8], 16.0);
        assert_eq!(stats[9], 200.0);
        assert_eq!(stats[10], 64.0);
        assert_eq!(stats[11], 64.0);
    }

    #[test]
    fn test_uniform_image_texture_blocks() {
        let raw = raw_features(&solid_png(64, 64, [200, 16, 88])).unwrap();
        let texture = &raw[108..];

        for block in texture[..48].chunks(3) {
            assert_eq!(block, &[200.0, 16.0, 88.0]);
        }
        assert!(texture[48..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_texture_row_major_order() {
        // Left half red, right half blue
        let img = RgbImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let features = features_from_rgb(&img);
        let texture = &features[108..156];

        assert_eq!(&texture[0..3], &[255.0, 0.0, 0.0]);
        assert_eq!(&texture[9..12], &[0.0, 0.0, 255.0]);
        assert_eq!(&texture[12..15], &[255.0, 0.0, 0.0]);
    }

    #[test]
    fn test_population_std() {
        let (mean, std) = mean_std([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter());
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }

    // ------------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------------

    #[test]
    fn test_extract_image_normalized_and_padded() {
        let e = extract_image(&gradient_png(80, 120)).unwrap();
        assert_eq!(e.len(), 256);
        assert!((e.norm() - 1.0).abs() < 1e-6);
        assert!(e.as_slice()[208..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_extract_image_deterministic() {
        let bytes = gradient_png(33, 47);
        let a = extract_image(&bytes).unwrap();
        let b = extract_image(&bytes).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_extract_image_format_sniffed() {
        let img = RgbImage::from_pixel(20, 20, Rgb([10, 20, 30]));
        let png = encode(img.clone(), ImageFormat::Png);
        let bmp = encode(img, ImageFormat::Bmp);

        assert_eq!(extract_image(&png).unwrap(), extract_image(&bmp).unwrap());
    }

    #[test]
    fn test_extract_image_corrupt_bytes() {
        let err = extract_image(b"definitely not an image").unwrap_err();
        assert!(err.is_extraction());
    }

    #[test]
    fn test_extract_image_empty_bytes() {
        assert!(extract_image(&[]).unwrap_err().is_extraction());
    }

    #[tokio::test]
    async fn test_extract_bytes_matches_sync() {
        let bytes = gradient_png(40, 40);
        let extractor = ImageExtractor::default();

        let sync = extractor.extract(&bytes).unwrap();
        let asynced = extractor.extract_bytes(bytes).await.unwrap();
        assert_eq!(sync, asynced);
    }

    #[tokio::test]
    async fn test_extract_path_reads_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cat.png");
        tokio::fs::write(&path, solid_png(16, 16, [1, 2, 3]))
            .await
            .unwrap();

        let e = ImageExtractor::default().extract_path(&path).await.unwrap();
        assert!((e.norm() - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_extract_path_missing_is_extraction_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = ImageExtractor::default()
            .extract_path(&temp.path().join("gone.png"))
            .await
            .unwrap_err();

        assert!(err.is_extraction());
        assert!(err.to_string().contains("gone.png"));
    }

    #[tokio::test]
    async fn test_extract_bytes_times_out() {
        let bytes = gradient_png(1600, 1600);
        let err = ImageExtractor::default()
            .with_timeout(Duration::ZERO)
            .extract_bytes(bytes)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.is_extraction());
        assert!(!err.is_index());
    }

    #[tokio::test]
    async fn test_extract_path_times_out() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("large.png");
        tokio::fs::write(&path, gradient_png(1600, 1600))
            .await
            .unwrap();

        let err = ImageExtractor::default()
            .with_timeout(Duration::ZERO)
            .extract_path(&path)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.is_extraction());
    }

    #[tokio::test]
    async fn test_extract_source_bytes() {
        let source = ImageSource::Bytes(solid_png(8, 8, [9, 9, 9]));
        let e = ImageExtractor::default()
            .extract_source(&source)
            .await
            .unwrap();
        assert_eq!(e.len(), 256);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_image_embedding_unit_norm(
            w in 1u32..24,
            h in 1u32..24,
            seed in any::<[u8; 3]>(),
        ) {
            let img = RgbImage::from_fn(w, h, |x, y| {
                Rgb([
                    seed[0].wrapping_add((x * 11) as u8),
                    seed[1].wrapping_add((y * 7) as u8),
                    seed[2].wrapping_add((x * y) as u8),
                ])
            });
            let bytes = encode(img, ImageFormat::Png);
            let e = extract_image(&bytes).unwrap();

            prop_assert_eq!(e.len(), 256);
            prop_assert!((e.norm() - 1.0).abs() < 1e-6);
            prop_assert_eq!(&e, &extract_image(&bytes).unwrap());
        }
    }
}
