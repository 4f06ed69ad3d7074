//! Cache Value Module
//!
//! Tagged variant stored in the memory tier, one case per supported value
//! kind, so a typed read that hits a different kind is a miss instead of a
//! cast failure.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Magic prefix of the canonical bitmap encoding.
const IMAGE_MAGIC: [u8; 4] = *b"TCBM";
/// Bytes per pixel (RGBA8).
const BYTES_PER_PIXEL: usize = 4;
/// Encoded header: magic + width + height.
const IMAGE_HEADER_LEN: usize = 12;

// == Image Data ==
/// A decoded image buffer: RGBA8 pixels with explicit dimensions.
///
/// The canonical on-disk encoding is the 4-byte magic, width and height as
/// little-endian u32, then the raw pixel bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    /// Creates an image buffer, validating that the pixel length matches
    /// the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(CacheError::Encode(format!(
                "image pixel length {} does not match {}x{} RGBA dimensions",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// In-memory footprint of the pixel buffer in bytes.
    pub fn byte_count(&self) -> u64 {
        self.pixels.len() as u64
    }

    // == Encode ==
    /// Serializes to the canonical bitmap encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IMAGE_HEADER_LEN + self.pixels.len());
        out.extend_from_slice(&IMAGE_MAGIC);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.pixels);
        out
    }

    // == Decode ==
    /// Parses the canonical bitmap encoding, rejecting wrong magic or a
    /// pixel length that disagrees with the header.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IMAGE_HEADER_LEN || bytes[..4] != IMAGE_MAGIC {
            return Err(CacheError::Decode("not a canonical bitmap".to_string()));
        }
        let mut dim = [0u8; 4];
        dim.copy_from_slice(&bytes[4..8]);
        let width = u32::from_le_bytes(dim);
        dim.copy_from_slice(&bytes[8..12]);
        let height = u32::from_le_bytes(dim);
        Self::new(width, height, bytes[IMAGE_HEADER_LEN..].to_vec())
            .map_err(|_| CacheError::Decode("bitmap header disagrees with pixel length".to_string()))
    }
}

// == Cache Value ==
/// Type-tagged value resident in the memory tier.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// UTF-8 text
    Text(String),
    /// Raw byte blob
    Bytes(Vec<u8>),
    /// Structured JSON-like record
    Record(serde_json::Value),
    /// Decoded image buffer
    Image(ImageData),
    /// Generic object, held in its serialized binary form
    Object(Vec<u8>),
}

impl CacheValue {
    /// Approximate in-memory footprint, used by the `BySize` accounting
    /// mode. Structured records fall back to their serialized length.
    pub fn size_units(&self) -> u64 {
        match self {
            CacheValue::Text(s) => s.len() as u64,
            CacheValue::Bytes(b) => b.len() as u64,
            CacheValue::Record(v) => serde_json::to_vec(v)
                .map(|encoded| encoded.len() as u64)
                .unwrap_or(1),
            CacheValue::Image(img) => img.byte_count(),
            CacheValue::Object(b) => b.len() as u64,
        }
    }

    /// Short kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheValue::Text(_) => "text",
            CacheValue::Bytes(_) => "bytes",
            CacheValue::Record(_) => "record",
            CacheValue::Image(_) => "image",
            CacheValue::Object(_) => "object",
        }
    }

    /// Returns true for image values, which the memory tier only retains
    /// under byte-size accounting.
    pub fn is_image(&self) -> bool {
        matches!(self, CacheValue::Image(_))
    }
}
