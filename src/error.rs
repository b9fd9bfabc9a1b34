use crate::cascade::FormatError;
use crate::image::ImageError;
use crate::scan::InvalidParams;

/// Any failure of the load → scan → cluster pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectError {
    Format(FormatError),
    Params(InvalidParams),
    Image(ImageError),
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::Format(e) => write!(f, "invalid cascade: {e}"),
            DetectError::Params(e) => write!(f, "invalid parameters: {e}"),
            DetectError::Image(e) => write!(f, "invalid image: {e}"),
        }
    }
}

impl std::error::Error for DetectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectError::Format(e) => Some(e),
            DetectError::Params(e) => Some(e),
            DetectError::Image(e) => Some(e),
        }
    }
}

impl From<FormatError> for DetectError {
    fn from(e: FormatError) -> Self {
        DetectError::Format(e)
    }
}

impl From<InvalidParams> for DetectError {
    fn from(e: InvalidParams) -> Self {
        DetectError::Params(e)
    }
}

impl From<ImageError> for DetectError {
    fn from(e: ImageError) -> Self {
        DetectError::Image(e)
    }
}
