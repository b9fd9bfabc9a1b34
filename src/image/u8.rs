//! Borrowed 8-bit grayscale view with an explicit row stride.
//!
//! The buffer may be a sub-region of a larger allocation: `ldim` is the number
//! of bytes between the starts of consecutive rows and must be at least
//! `ncols`. Only the first `ncols` bytes of each row are ever read.

/// Reasons an image view cannot be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageError {
    EmptyImage { nrows: usize, ncols: usize },
    StrideTooSmall { ldim: usize, ncols: usize },
    BufferTooSmall { len: usize, required: usize },
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::EmptyImage { nrows, ncols } => {
                write!(f, "image has no pixels ({nrows}x{ncols})")
            }
            ImageError::StrideTooSmall { ldim, ncols } => {
                write!(f, "row stride {ldim} is smaller than the column count {ncols}")
            }
            ImageError::BufferTooSmall { len, required } => {
                write!(f, "pixel buffer too small ({len} < {required} bytes)")
            }
        }
    }
}

impl std::error::Error for ImageError {}

/// Read-only grayscale view. Only [`ImageU8::new`] and [`ImageU8::packed`]
/// build one, so every view in circulation has a buffer large enough for its
/// geometry:
///
/// ```compile_fail
/// let pixels = [0u8; 4];
/// let view = cascade_detector::ImageU8 { nrows: 8, ncols: 8, ldim: 8, pixels: &pixels };
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ImageU8<'a> {
    nrows: usize,
    ncols: usize,
    ldim: usize, // bytes between rows
    pixels: &'a [u8],
}

impl<'a> ImageU8<'a> {
    /// Validate the geometry and wrap `pixels` as a read-only view.
    pub fn new(pixels: &'a [u8], nrows: usize, ncols: usize, ldim: usize) -> Result<Self, ImageError> {
        if nrows == 0 || ncols == 0 {
            return Err(ImageError::EmptyImage { nrows, ncols });
        }
        if ldim < ncols {
            return Err(ImageError::StrideTooSmall { ldim, ncols });
        }
        // The last row only needs `ncols` bytes, but the contract asks for a
        // full stride per row.
        let required = nrows
            .checked_mul(ldim)
            .ok_or(ImageError::BufferTooSmall {
                len: pixels.len(),
                required: usize::MAX,
            })?;
        if pixels.len() < required {
            return Err(ImageError::BufferTooSmall {
                len: pixels.len(),
                required,
            });
        }
        Ok(Self {
            nrows,
            ncols,
            ldim,
            pixels,
        })
    }

    /// Tightly packed view (`ldim == ncols`).
    pub fn packed(pixels: &'a [u8], nrows: usize, ncols: usize) -> Result<Self, ImageError> {
        Self::new(pixels, nrows, ncols, ncols)
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn ldim(&self) -> usize {
        self.ldim
    }

    /// Underlying buffer, including row padding.
    #[inline]
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u8 {
        self.pixels[r * self.ldim + c]
    }
}

impl<'a> crate::image::traits::ImageView for ImageU8<'a> {
    type Pixel = u8;

    #[inline]
    fn width(&self) -> usize {
        self.ncols
    }
    #[inline]
    fn height(&self) -> usize {
        self.nrows
    }
    #[inline]
    fn stride(&self) -> usize {
        self.ldim
    }
    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.ldim;
        &self.pixels[start..start + self.ncols]
    }
    #[inline]
    fn as_slice(&self) -> Option<&[u8]> {
        (self.ldim == self.ncols).then_some(&self.pixels[..self.ncols * self.nrows])
    }
}
