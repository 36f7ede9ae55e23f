//! Measurement model

use crate::utils::date::Day;

/// A dated measurement with a raw string value
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Measurement type code (WEIGHT, HEIGHT, BMI, ...)
    pub measurement_type: String,
    /// Day of the measurement
    pub date: Day,
    /// Value as recorded
    pub value: String,
    /// Optional unit
    pub unit: Option<String>,
}

impl Measurement {
    /// Create a new measurement
    #[must_use]
    pub fn new(measurement_type: impl Into<String>, date: Day, value: impl Into<String>) -> Self {
        Self {
            measurement_type: measurement_type.into(),
            date,
            value: value.into(),
            unit: None,
        }
    }

    /// Attach a unit
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Numeric value, accepting a decimal comma
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        let trimmed = self.value.trim();
        trimmed
            .parse::<f64>()
            .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
            .ok()
            .filter(|v| v.is_finite())
    }

    /// Whether the measurement type is one of `types`
    #[must_use]
    pub fn is_any_of(&self, types: &[String]) -> bool {
        types.iter().any(|t| t == &self.measurement_type)
    }
}
