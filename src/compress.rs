//! Adaptive image compression and data-URL helpers
//!
//! User-supplied images are shrunk before they reach the blob store:
//! decode, downscale to fit the configured box, encode, then lower the
//! quality step by step until the result fits the size budget, the quality
//! floor is reached, or the attempt budget runs out. Animated images are
//! never re-encoded.

use std::io::Cursor;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

/// Knobs for [`compress`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Initial encode quality, 1-100
    pub quality: u8,
    pub max_size_kb: u32,
    pub quality_step: u8,
    pub min_quality: u8,
    pub max_attempts: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: 80,
            max_size_kb: 500,
            quality_step: 10,
            min_quality: 10,
            max_attempts: 5,
        }
    }
}

impl CompressOptions {
    pub fn target_bytes(&self) -> usize {
        self.max_size_kb as usize * 1024
    }
}

/// Outcome of [`compress`]
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// Quality of the final encode (the initial quality for pass-through)
    pub quality: u8,
    /// Number of encodes performed, 0 for pass-through
    pub attempts: u32,
    pub met_target: bool,
    /// Input returned untouched because it is animated
    pub passthrough: bool,
}

impl Compressed {
    pub fn to_data_url(&self) -> String {
        DataUrl::new(self.mime.clone(), self.bytes.clone()).to_string()
    }
}

/// Decoder/encoder pair driven by [`compress`]
pub trait ImageCodec {
    type Raster;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Raster>;

    fn dimensions(&self, raster: &Self::Raster) -> (u32, u32);

    fn resize(&self, raster: Self::Raster, width: u32, height: u32) -> Self::Raster;

    fn encode(&self, raster: &Self::Raster, quality: u8) -> Result<Vec<u8>>;

    /// MIME type of [`ImageCodec::encode`] output
    fn output_mime(&self) -> &'static str;
}

/// Production codec: decodes anything the `image` crate reads, encodes JPEG
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    type Raster = image::DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Raster> {
        Ok(image::load_from_memory(bytes)?)
    }

    fn dimensions(&self, raster: &Self::Raster) -> (u32, u32) {
        (raster.width(), raster.height())
    }

    fn resize(&self, raster: Self::Raster, width: u32, height: u32) -> Self::Raster {
        raster.resize_exact(width, height, image::imageops::FilterType::Triangle)
    }

    fn encode(&self, raster: &Self::Raster, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
            // JPEG has no alpha channel
            encoder.encode_image(&raster.to_rgb8())?;
        }
        Ok(buf)
    }

    fn output_mime(&self) -> &'static str {
        "image/jpeg"
    }
}

/// Largest size that fits in `max_width` x `max_height` keeping the aspect ratio.
/// Images already inside the box are left alone.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Whether `bytes` hold an animated image (GIF, animated WebP, APNG)
pub fn is_animated(bytes: &[u8]) -> bool {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return true;
    }

    // VP8X header: flags byte at offset 20, animation bit 0x02
    if bytes.len() > 20 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return &bytes[12..16] == b"VP8X" && bytes[20] & 0x02 != 0;
    }

    // APNG: acTL chunk ahead of the first IDAT
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        let actl = find(bytes, b"acTL");
        let idat = find(bytes, b"IDAT");
        return match (actl, idat) {
            (Some(a), Some(i)) => a < i,
            (Some(_), None) => true,
            _ => false,
        };
    }

    false
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// MIME type sniffed from the leading bytes
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Shrink `bytes` until they fit `opts.max_size_kb`, best effort.
///
/// Always terminates after at most `opts.max_attempts` encodes. With a
/// budget of two or more encodes the result either fits the target or was
/// encoded at the quality floor; `met_target` tells which.
pub fn compress<C: ImageCodec>(codec: &C, bytes: &[u8], opts: &CompressOptions) -> Result<Compressed> {
    let target = opts.target_bytes();

    if is_animated(bytes) {
        tracing::debug!("Animated image ({} bytes), skipping re-encode", bytes.len());
        return Ok(Compressed {
            bytes: bytes.to_vec(),
            mime: sniff_mime(bytes).to_string(),
            quality: opts.quality,
            attempts: 0,
            met_target: bytes.len() <= target,
            passthrough: true,
        });
    }

    let mut raster = codec.decode(bytes)?;
    let (width, height) = codec.dimensions(&raster);
    let (fit_w, fit_h) = fit_within(width, height, opts.max_width, opts.max_height);
    if (fit_w, fit_h) != (width, height) {
        tracing::debug!("Downscaling {}x{} to {}x{}", width, height, fit_w, fit_h);
        raster = codec.resize(raster, fit_w, fit_h);
    }

    let max_attempts = opts.max_attempts.max(1);
    let floor = opts.min_quality.clamp(1, 100);
    let mut quality = opts.quality.min(100).max(floor);
    let mut encoded = codec.encode(&raster, quality)?;
    let mut attempts = 1;

    while encoded.len() > target && attempts < max_attempts && quality > floor {
        // The last allowed encode always runs at the floor
        quality = if attempts + 1 == max_attempts {
            floor
        } else {
            quality.saturating_sub(opts.quality_step).max(floor)
        };
        encoded = codec.encode(&raster, quality)?;
        attempts += 1;
        tracing::debug!("Attempt {}: quality {} -> {} bytes", attempts, quality, encoded.len());
    }

    let met_target = encoded.len() <= target;
    if !met_target {
        tracing::warn!(
            "Image still {} KB after {} attempts (target {} KB)",
            encoded.len() / 1024,
            attempts,
            opts.max_size_kb
        );
    }

    Ok(Compressed {
        bytes: encoded,
        mime: codec.output_mime().to_string(),
        quality,
        attempts,
        met_target,
        passthrough: false,
    })
}

/// Reject uploads that are not images or are larger than `max_bytes`.
/// Runs before any storage call.
pub fn validate_upload(mime: &str, len: usize, max_bytes: usize) -> Result<()> {
    if !mime.starts_with("image/") {
        return Err(Error::Validation(format!("not an image: {}", mime)));
    }
    if len > max_bytes {
        return Err(Error::Validation(format!(
            "image is {} KB, limit is {} KB",
            len / 1024,
            max_bytes / 1024
        )));
    }
    Ok(())
}

/// A `data:<mime>;base64,<payload>` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { mime: mime.into(), bytes }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| Error::Validation("missing data: prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::Validation("missing data-URL payload".to_string()))?;

        let (mime, is_base64) = match header.strip_suffix(";base64") {
            Some(mime) => (mime, true),
            None => (header, false),
        };

        let bytes = if is_base64 {
            STANDARD
                .decode(payload)
                .map_err(|e| Error::Validation(format!("bad base64 payload: {}", e)))?
        } else {
            payload.as_bytes().to_vec()
        };

        Ok(Self { mime: mime.to_string(), bytes })
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}
