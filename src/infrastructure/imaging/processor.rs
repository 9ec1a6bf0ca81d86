use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use derive_more::Display;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageReader};
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use crate::entities::variant::{variant_file_name, ImageVariant, OutputFormat, VariantSpec, VARIANT_SPECS};

#[derive(Debug, Display)]
pub enum ImagingError {
    #[display("Could not decode image: {_0}")]
    Decode(String),

    #[display("Could not encode {_0}: {_1}")]
    Encode(OutputFormat, String),

    #[display("Image IO failed: {_0}")]
    Io(String),

    #[display("Image worker failed: {_0}")]
    Worker(String),
}

impl std::error::Error for ImagingError {}

impl From<std::io::Error> for ImagingError {
    fn from(err: std::io::Error) -> Self {
        ImagingError::Io(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Box a variant is cover-cropped into, or `None` when the source is kept as is.
///
/// A resize happens only when the source exceeds the target on some axis, and
/// each axis of the box is clamped to the source so nothing is ever upscaled.
pub fn cover_target(source: Dimensions, target: Option<(u32, u32)>) -> Option<Dimensions> {
    let (tw, th) = target?;
    if source.width > tw || source.height > th {
        Some(Dimensions {
            width: tw.min(source.width),
            height: th.min(source.height),
        })
    } else {
        None
    }
}

pub fn render_variant(img: &DynamicImage, spec: &VariantSpec) -> DynamicImage {
    let source = Dimensions { width: img.width(), height: img.height() };
    match cover_target(source, spec.target) {
        Some(Dimensions { width, height }) => img.resize_to_fill(width, height, FilterType::Lanczos3),
        None => img.clone(),
    }
}

pub fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, ImagingError> {
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let mut buf = Cursor::new(Vec::new());
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| ImagingError::Encode(format, e.to_string()))?;
            Ok(buf.into_inner())
        }
        OutputFormat::Webp => {
            let (width, height) = (img.width(), img.height());
            let encoded = if img.color().has_alpha() {
                let rgba = img.to_rgba8();
                webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality as f32)
            } else {
                let rgb = img.to_rgb8();
                webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality as f32)
            };
            encoded
                .map(|memory| memory.to_vec())
                .map_err(|e| ImagingError::Encode(format, format!("{:?}", e)))
        }
    }
}

fn decode(path: &Path) -> Result<DynamicImage, ImagingError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ImagingError::Decode(e.to_string()))
}

/// Runs decoding and encoding on the blocking pool, bounded by a shared permit count.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    workers: Arc<Semaphore>,
}

impl ImageProcessor {
    pub fn new(max_concurrent: usize) -> Self {
        ImageProcessor {
            workers: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Reads only the header; rejects anything the decoder can't identify.
    pub async fn probe(&self, path: PathBuf) -> Result<Dimensions, ImagingError> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| ImagingError::Worker(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let (width, height) = ImageReader::open(&path)?
                .with_guessed_format()?
                .into_dimensions()
                .map_err(|e| ImagingError::Decode(e.to_string()))?;
            Ok(Dimensions { width, height })
        })
        .await
        .map_err(|e| ImagingError::Worker(e.to_string()))?
    }

    /// Writes every canonical variant of `source` in every output format into `output_dir`.
    #[instrument(skip(self, source, output_dir))]
    pub async fn generate_variants(
        &self,
        source: PathBuf,
        filename: String,
        output_dir: PathBuf,
    ) -> Result<Vec<ImageVariant>, ImagingError> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| ImagingError::Worker(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let img = decode(&source)?;
            let mut variants = Vec::with_capacity(VARIANT_SPECS.len() * OutputFormat::ALL.len());

            for spec in VARIANT_SPECS.iter() {
                let rendered = render_variant(&img, spec);
                for format in OutputFormat::ALL {
                    let bytes = encode(&rendered, format, spec.quality)?;
                    let file_name = variant_file_name(&filename, spec.name, format);
                    std::fs::write(output_dir.join(&file_name), &bytes)?;

                    variants.push(ImageVariant {
                        name: spec.name,
                        format,
                        width: rendered.width(),
                        height: rendered.height(),
                        quality: spec.quality,
                        size: bytes.len() as u64,
                        file_name,
                    });
                }
            }

            debug!(count = variants.len(), "variants written");
            Ok(variants)
        })
        .await
        .map_err(|e| ImagingError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::variant::VariantName;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn small_sources_are_never_upscaled() {
        assert_eq!(cover_target(dims(100, 80), Some((150, 150))), None);
        assert_eq!(cover_target(dims(300, 200), Some((400, 300))), None);
        assert_eq!(cover_target(dims(1000, 500), Some((800, 600))), Some(dims(800, 500)));
        assert_eq!(cover_target(dims(5000, 5000), None), None);
    }

    #[test]
    fn large_sources_hit_exact_target() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2000, 1500, Rgb([120, 30, 200])));
        let medium = render_variant(&img, &VariantName::Medium.spec());
        assert_eq!((medium.width(), medium.height()), (800, 600));

        let thumb = render_variant(&img, &VariantName::Thumbnail.spec());
        assert_eq!((thumb.width(), thumb.height()), (150, 150));
    }

    #[test]
    fn both_formats_encode_with_their_signatures() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 30, Rgba([10, 20, 30, 128])));

        let jpeg = encode(&img, OutputFormat::Jpeg, 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let webp = encode(&img, OutputFormat::Webp, 85).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[actix_rt::test]
    async fn generates_every_variant_in_both_formats() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("image-1-555555555.png");
        RgbImage::from_pixel(640, 480, Rgb([0, 128, 255])).save(&source).unwrap();

        let processor = ImageProcessor::new(2);
        assert_eq!(processor.probe(source.clone()).await.unwrap(), dims(640, 480));

        let variants = processor
            .generate_variants(source, "image-1-555555555.png".into(), dir.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(variants.len(), 10);
        let medium = variants
            .iter()
            .find(|v| v.name == VariantName::Medium && v.format == OutputFormat::Webp)
            .unwrap();
        assert_eq!((medium.width, medium.height), (640, 480));
        assert!(dir.path().join("image-1-555555555-medium.webp").exists());
        assert!(dir.path().join("image-1-555555555-thumbnail.jpg").exists());
    }

    #[actix_rt::test]
    async fn probe_rejects_non_images() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not pixels").unwrap();

        let err = ImageProcessor::new(1).probe(path).await.unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }
}
