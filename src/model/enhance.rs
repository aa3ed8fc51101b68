//! Conversion of raw stored values to physical values.
//!
//! Decoders return what is stored in the file. Callers that want physical
//! units build an [`Enhancement`] from the variable's attributes and apply it.

use super::attribute::AttributeContainer;
use ndarray::Array1;

/// Linear scaling and missing-value handling described by CF attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Enhancement {
    /// Multiplier applied to the raw value.
    pub scale_factor: f64,
    /// Offset added after scaling.
    pub add_offset: f64,
    /// Raw values that mean "no data".
    pub missing: Vec<f64>,
}

impl Default for Enhancement {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            add_offset: 0.0,
            missing: Vec::new(),
        }
    }
}

impl Enhancement {
    /// Read `scale_factor`, `add_offset`, `missing_value` and `_FillValue`.
    pub fn from_attributes(attrs: &impl AttributeContainer) -> Self {
        let number = |name: &str| attrs.find_attribute(name).and_then(|a| a.numeric_value());
        let mut missing = Vec::new();
        for name in ["missing_value", "_FillValue"] {
            if let Some(att) = attrs.find_attribute(name) {
                missing.extend(att.value().elements().iter().filter_map(|v| v.as_f64()));
            }
        }
        Self {
            scale_factor: number("scale_factor").unwrap_or(1.0),
            add_offset: number("add_offset").unwrap_or(0.0),
            missing,
        }
    }

    /// Check if applying this enhancement changes nothing.
    pub fn is_identity(&self) -> bool {
        self.scale_factor == 1.0 && self.add_offset == 0.0 && self.missing.is_empty()
    }

    /// Check if a raw value is flagged as missing.
    pub fn is_missing(&self, raw: f64) -> bool {
        raw.is_nan() || self.missing.iter().any(|m| *m == raw)
    }

    /// Physical value for a raw value, NaN when missing.
    pub fn apply(&self, raw: f64) -> f64 {
        if self.is_missing(raw) {
            f64::NAN
        } else {
            raw * self.scale_factor + self.add_offset
        }
    }

    /// Apply to a whole column.
    pub fn apply_array(&self, raw: &Array1<f64>) -> Array1<f64> {
        raw.mapv(|v| self.apply(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, AttributeSet};

    #[test]
    fn test_scale_offset_missing() {
        let mut attrs = AttributeSet::new("temp");
        attrs.add(Attribute::new("scale_factor", 0.01f64));
        attrs.add(Attribute::new("add_offset", 10.0f64));
        attrs.add(Attribute::new("missing_value", -9999i32));
        let e = Enhancement::from_attributes(&attrs);
        assert!((e.apply(250.0) - 12.5).abs() < 1e-9);
        assert!(e.apply(-9999.0).is_nan());

        let out = e.apply_array(&Array1::from(vec![0.0, -9999.0, 100.0]));
        assert!((out[0] - 10.0).abs() < 1e-9);
        assert!(out[1].is_nan());
        assert!((out[2] - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_identity_without_attributes() {
        let e = Enhancement::from_attributes(&AttributeSet::new("x"));
        assert!(e.is_identity());
        assert_eq!(e.apply(3.5), 3.5);
    }
}
