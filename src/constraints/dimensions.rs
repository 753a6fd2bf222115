use crate::error::{OmniError, Result};
use crate::types::ParamValue;
use std::collections::BTreeMap;

/// `"WIDTHxHEIGHT"` constraint with pixel-count and aspect-ratio bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimensions {
    pub min_pixels: u64,
    pub max_pixels: u64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Human labels (e.g. `"square"`, `"1K"`) resolved to literal sizes.
    pub presets: BTreeMap<String, String>,
}

impl Dimensions {
    pub fn new(min_pixels: u64, max_pixels: u64, min_aspect_ratio: f64, max_aspect_ratio: f64) -> Self {
        Self {
            min_pixels,
            max_pixels,
            min_aspect_ratio,
            max_aspect_ratio,
            presets: BTreeMap::new(),
        }
    }

    pub fn with_preset(mut self, label: impl Into<String>, size: impl Into<String>) -> Self {
        self.presets.insert(label.into(), size.into());
        self
    }

    pub(super) fn validate(&self, value: &ParamValue) -> Result<ParamValue> {
        let raw = value.as_str().ok_or_else(|| {
            OmniError::constraint(format!("Must be string, got {}", value.type_name()))
        })?;
        let actual = self.presets.get(raw).map(String::as_str).unwrap_or(raw);

        let lower = actual.to_lowercase();
        let parts: Vec<&str> = lower.split('x').collect();
        if parts.len() != 2 {
            return Err(OmniError::constraint(format!(
                "Invalid dimension format: '{actual}'. Expected 'WIDTHxHEIGHT'"
            )));
        }
        let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !is_digits(parts[0]) || !is_digits(parts[1]) {
            return Err(OmniError::constraint(format!(
                "Invalid dimension format: '{actual}'. Width and height must be positive integers"
            )));
        }
        let (width, height) = match (parts[0].parse::<u64>(), parts[1].parse::<u64>()) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(OmniError::constraint(format!(
                    "Invalid dimension format: '{actual}'. Width and height must be positive integers"
                )));
            }
        };

        if width == 0 || height == 0 {
            return Err(OmniError::constraint(format!(
                "Width and height must be positive, got {width}x{height}"
            )));
        }

        let total = width.saturating_mul(height);
        if !(self.min_pixels <= total && total <= self.max_pixels) {
            return Err(OmniError::constraint(format!(
                "Total pixels {} outside valid range [{}, {}]",
                group_thousands(total),
                group_thousands(self.min_pixels),
                group_thousands(self.max_pixels)
            )));
        }

        let aspect = width as f64 / height as f64;
        if !(self.min_aspect_ratio <= aspect && aspect <= self.max_aspect_ratio) {
            return Err(OmniError::constraint(format!(
                "Aspect ratio {aspect:.3} outside valid range [{:.3}, {:.3}]",
                self.min_aspect_ratio, self.max_aspect_ratio
            )));
        }

        Ok(ParamValue::Str(format!("{width}x{height}")))
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
