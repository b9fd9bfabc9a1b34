//! Parameters of the multiscale sliding-window scan.

use serde::Deserialize;

/// Window geometry across scales.
///
/// Sizes grow geometrically from `min_size` by `scale_factor` while they stay
/// at or below `max_size`. At each size the window center advances by
/// `max(1, round(shift_factor · size))` pixels in both directions.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Fraction of the window size to advance between positions, in `(0, 1]`.
    pub shift_factor: f32,
    /// Smallest window side length in pixels (> 0).
    pub min_size: u32,
    /// Largest window side length in pixels (>= `min_size`).
    pub max_size: u32,
    /// Window growth ratio per scale step (> 1).
    pub scale_factor: f32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            shift_factor: 0.1,
            min_size: 20,
            max_size: 1000,
            scale_factor: 1.1,
        }
    }
}

/// Parameter values outside their documented ranges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InvalidParams {
    ShiftFactor(f32),
    MinSize(u32),
    SizeRange { min_size: u32, max_size: u32 },
    ScaleFactor(f32),
    IouThreshold(f32),
}

impl std::fmt::Display for InvalidParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidParams::ShiftFactor(v) => write!(f, "shift factor {v} not in (0, 1]"),
            InvalidParams::MinSize(v) => write!(f, "minimum window size {v} must be positive"),
            InvalidParams::SizeRange { min_size, max_size } => {
                write!(f, "maximum window size {max_size} below minimum {min_size}")
            }
            InvalidParams::ScaleFactor(v) => write!(f, "scale factor {v} must be finite and > 1"),
            InvalidParams::IouThreshold(v) => write!(f, "IoU threshold {v} not in [0, 1]"),
        }
    }
}

impl std::error::Error for InvalidParams {}

impl ScanParams {
    pub fn new(shift_factor: f32, min_size: u32, max_size: u32, scale_factor: f32) -> Self {
        Self {
            shift_factor,
            min_size,
            max_size,
            scale_factor,
        }
    }

    /// Check every field against its range. NaN fails every check.
    pub fn validate(&self) -> Result<(), InvalidParams> {
        if !(self.shift_factor > 0.0 && self.shift_factor <= 1.0) {
            return Err(InvalidParams::ShiftFactor(self.shift_factor));
        }
        if self.min_size == 0 {
            return Err(InvalidParams::MinSize(self.min_size));
        }
        if self.max_size < self.min_size {
            return Err(InvalidParams::SizeRange {
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(InvalidParams::ScaleFactor(self.scale_factor));
        }
        Ok(())
    }

    /// Window sizes visited by the scan, smallest first.
    pub fn sizes(&self) -> Vec<f32> {
        self.sizes_within(usize::MAX)
    }

    /// Sizes no larger than `extent`, the shorter image side. Larger windows
    /// fit nowhere, so the sequence stops there instead of at `max_size`.
    pub fn sizes_within(&self, extent: usize) -> Vec<f32> {
        let mut sizes = Vec::new();
        let max = (self.max_size as f32).min(extent as f32);
        let mut s = self.min_size as f32;
        while s <= max {
            sizes.push(s);
            s *= self.scale_factor;
        }
        sizes
    }

    /// Center step for windows of side `size`.
    #[inline]
    pub fn step_for(&self, size: f32) -> usize {
        ((self.shift_factor * size).round() as usize).max(1)
    }
}

pub(crate) fn validate_iou_threshold(threshold: f32) -> Result<(), InvalidParams> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(InvalidParams::IouThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ScanParams::default().validate(), Ok(()));
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let base = ScanParams::new(0.5, 2, 4, 2.0);
        assert_eq!(base.validate(), Ok(()));
        let cases = [
            (ScanParams { shift_factor: 0.0, ..base }, InvalidParams::ShiftFactor(0.0)),
            (ScanParams { shift_factor: 1.5, ..base }, InvalidParams::ShiftFactor(1.5)),
            (ScanParams { min_size: 0, ..base }, InvalidParams::MinSize(0)),
            (
                ScanParams { min_size: 5, ..base },
                InvalidParams::SizeRange { min_size: 5, max_size: 4 },
            ),
            (ScanParams { scale_factor: 1.0, ..base }, InvalidParams::ScaleFactor(1.0)),
            (ScanParams { scale_factor: 0.9, ..base }, InvalidParams::ScaleFactor(0.9)),
        ];
        for (params, expected) in cases {
            assert_eq!(params.validate(), Err(expected));
        }
        let nan = ScanParams { shift_factor: f32::NAN, ..base };
        assert!(matches!(nan.validate(), Err(InvalidParams::ShiftFactor(_))));
    }

    #[test]
    fn sizes_grow_geometrically_up_to_max() {
        assert_eq!(ScanParams::new(0.5, 2, 4, 2.0).sizes(), vec![2.0, 4.0]);
        assert_eq!(ScanParams::new(0.5, 3, 3, 1.5).sizes(), vec![3.0]);
        let sizes = ScanParams::new(0.1, 20, 30, 1.1).sizes();
        assert_eq!(sizes.len(), 5);
        assert!(sizes.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn sizes_stop_at_the_image_extent() {
        let p = ScanParams::new(0.5, 2, u32::MAX, 2.0);
        assert_eq!(p.sizes().len(), 32);
        assert_eq!(p.sizes_within(10), vec![2.0, 4.0, 8.0]);
        assert_eq!(p.sizes_within(8), vec![2.0, 4.0, 8.0]);
        assert_eq!(ScanParams::new(0.5, 20, 40, 1.1).sizes_within(10), Vec::<f32>::new());
    }

    #[test]
    fn step_never_drops_to_zero() {
        let p = ScanParams::new(0.01, 10, 10, 2.0);
        assert_eq!(p.step_for(10.0), 1);
        assert_eq!(ScanParams::new(0.5, 2, 4, 2.0).step_for(4.0), 2);
        assert_eq!(ScanParams::new(0.1, 20, 40, 1.1).step_for(25.0), 3);
    }

    #[test]
    fn iou_threshold_range() {
        assert!(validate_iou_threshold(0.0).is_ok());
        assert!(validate_iou_threshold(1.0).is_ok());
        assert!(validate_iou_threshold(-0.1).is_err());
        assert!(validate_iou_threshold(f32::NAN).is_err());
    }
}
