//! Image optimization. Raster sources are re-encoded at a fixed quality
//! level and written to `<out>/images/`, mirroring their layout under the
//! images source directory. Files are processed in parallel; a file that
//! fails to decode is logged and skipped.
//!
//! GIFs are copied verbatim: re-encoding through a still-image codec would
//! drop animation frames.

use std::fs;
use std::sync::Mutex;

use camino::Utf8Path;
use image::ImageReader;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use thiserror::Error;

use crate::config::BuildContext;
use crate::registry::{Outcome, PipelineResult};

const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

pub fn run(ctx: &BuildContext) -> PipelineResult {
    let sources = ctx.paths.images.resolve(&ctx.paths.root)?;
    let out_dir = ctx.paths.out_dir().join("images");

    let written = Mutex::new(Vec::new());

    sources.into_par_iter().for_each(|source| {
        let path = ctx.paths.root.join(&source.path);

        let bytes = match optimize(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(file = %source.path, "couldn't optimize image: {err}");
                return;
            }
        };

        let dest = out_dir.join(&source.rel);
        match super::write_output(&dest, &bytes) {
            Ok(()) => written.lock().unwrap().push(dest),
            Err(err) => {
                tracing::error!(file = %dest, "couldn't write image: {err}");
            }
        }
    });

    Ok(Outcome::wrote(written.into_inner().unwrap()))
}

fn optimize(path: &Utf8Path) -> Result<Vec<u8>, ImageError> {
    let ext = path.extension().unwrap_or_default().to_ascii_lowercase();

    if ext == "gif" {
        return Ok(fs::read(path)?);
    }

    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let mut buffer = Vec::new();

    match ext.as_str() {
        "jpg" | "jpeg" => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
            // JPEG has no alpha channel.
            image::DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        _ => {
            let encoder = PngEncoder::new_with_quality(
                &mut buffer,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            img.write_with_encoder(encoder)?;
        }
    }

    Ok(buffer)
}
