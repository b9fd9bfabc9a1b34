//! I/O helpers for grayscale images and JSON.
//!
//! - `load_grayscale_image`: decode a PNG/JPEG into an owned 8-bit gray buffer.
//! - `rgba_to_grayscale`: reduce interleaved RGBA samples to intensity.
//! - `write_json_file`: pretty-print a serializable value to disk.
//!
//! None of this is used by the detection core; it backs the demo binary.
use super::{ImageError, ImageU8};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Owned 8-bit grayscale buffer with stride and borrowed view conversion.
#[derive(Clone, Debug)]
pub struct GrayImageU8 {
    nrows: usize,
    ncols: usize,
    ldim: usize,
    pixels: Vec<u8>,
}

impl GrayImageU8 {
    /// Construct an owned, tightly packed grayscale buffer.
    pub fn new(nrows: usize, ncols: usize, pixels: Vec<u8>) -> Self {
        Self {
            nrows,
            ncols,
            ldim: ncols,
            pixels,
        }
    }

    /// Override the row stride, e.g. when the decoder pads rows.
    pub fn with_ldim(mut self, ldim: usize) -> Self {
        self.ldim = ldim;
        self
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Borrow as a read-only, validated `ImageU8` view.
    pub fn as_view(&self) -> Result<ImageU8<'_>, ImageError> {
        ImageU8::new(&self.pixels, self.nrows, self.ncols, self.ldim)
    }
}

/// Reduce row-major RGBA samples to grayscale using `0.2 R + 0.7 G + 0.1 B`.
///
/// Integer arithmetic keeps the result reproducible across platforms.
pub fn rgba_to_grayscale(rgba: &[u8], nrows: usize, ncols: usize) -> Vec<u8> {
    let mut gray = vec![0u8; nrows * ncols];
    for (dst, px) in gray.iter_mut().zip(rgba.chunks_exact(4)) {
        let v = 2 * px[0] as u32 + 7 * px[1] as u32 + px[2] as u32;
        *dst = (v / 10) as u8;
    }
    gray
}

/// Decode an image from disk and convert it to 8-bit grayscale.
pub fn load_grayscale_image(path: &Path) -> Result<GrayImageU8, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_rgba8();
    let ncols = img.width() as usize;
    let nrows = img.height() as usize;
    let gray = rgba_to_grayscale(img.as_raw(), nrows, ncols);
    Ok(GrayImageU8::new(nrows, ncols, gray))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
