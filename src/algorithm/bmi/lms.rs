//! LMS growth references
//!
//! A reference table holds the Box-Cox power (L), median (M) and coefficient
//! of variation (S) per sex and age in months. Values between tabulated ages
//! are interpolated linearly.

use std::path::Path;

use arrow::array::StringArray;

use crate::error::{Error, Result};
use crate::loader::{TextColumns, cell, read_table};
use crate::models::Gender;

/// Average days per month used to convert ages
pub const DAYS_PER_MONTH: f64 = 30.4375;

/// LMS parameters at one age
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmsPoint {
    /// Age in months
    pub age_months: f64,
    /// Box-Cox power
    pub l: f64,
    /// Median
    pub m: f64,
    /// Coefficient of variation
    pub s: f64,
}

impl LmsPoint {
    /// Standard deviation score of `value`
    #[must_use]
    pub fn z_score(&self, value: f64) -> f64 {
        if self.l.abs() < 1e-12 {
            (value / self.m).ln() / self.s
        } else {
            ((value / self.m).powf(self.l) - 1.0) / (self.l * self.s)
        }
    }
}

/// Growth reference split by sex, each curve sorted by age
#[derive(Debug, Clone, Default)]
pub struct LmsReference {
    male: Vec<LmsPoint>,
    female: Vec<LmsPoint>,
}

impl LmsReference {
    /// Build a reference from `(sex, point)` pairs
    pub fn from_points(points: impl IntoIterator<Item = (Gender, LmsPoint)>) -> Self {
        let mut reference = Self::default();
        for (gender, point) in points {
            match gender {
                Gender::Male => reference.male.push(point),
                Gender::Female => reference.female.push(point),
                Gender::Unknown => {}
            }
        }
        reference.male.sort_by(|a, b| a.age_months.total_cmp(&b.age_months));
        reference.female.sort_by(|a, b| a.age_months.total_cmp(&b.age_months));
        reference
    }

    /// Load a `sex,ageMonths,L,M,S` table
    pub fn load(path: &Path) -> Result<Self> {
        let mut points = Vec::new();
        for batch in read_table(path, b',')? {
            let columns = TextColumns::new("lms reference", &batch);
            let sex = columns.required("sex")?;
            let age = columns.required("ageMonths")?;
            let l = columns.required("L")?;
            let m = columns.required("M")?;
            let s = columns.required("S")?;
            for row in 0..columns.num_rows() {
                let number = |column: &StringArray, name: &str| -> Result<f64> {
                    cell(Some(column), row)
                        .and_then(|v| v.parse::<f64>().ok())
                        .ok_or_else(|| {
                            Error::Other(format!("Invalid {name} in row {} of {}", row + 1, path.display()))
                        })
                };
                let gender = Gender::from(cell(Some(sex), row).unwrap_or_default());
                points.push((
                    gender,
                    LmsPoint {
                        age_months: number(age, "ageMonths")?,
                        l: number(l, "L")?,
                        m: number(m, "M")?,
                        s: number(s, "S")?,
                    },
                ));
            }
        }
        let reference = Self::from_points(points);
        if reference.male.is_empty() && reference.female.is_empty() {
            return Err(Error::Other(format!("No LMS rows in {}", path.display())));
        }
        Ok(reference)
    }

    /// Interpolated parameters, `None` outside the tabulated age range
    #[must_use]
    pub fn at(&self, gender: Gender, age_months: f64) -> Option<LmsPoint> {
        let curve = match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Unknown => return None,
        };
        let upper = curve.partition_point(|p| p.age_months < age_months);
        let hi = curve.get(upper)?;
        if (hi.age_months - age_months).abs() < f64::EPSILON {
            return Some(*hi);
        }
        let lo = curve.get(upper.checked_sub(1)?)?;
        let t = (age_months - lo.age_months) / (hi.age_months - lo.age_months);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Some(LmsPoint {
            age_months,
            l: lerp(lo.l, hi.l),
            m: lerp(lo.m, hi.m),
            s: lerp(lo.s, hi.s),
        })
    }

    /// Percentile (0-100) of `value` for the given sex and age
    #[must_use]
    pub fn percentile(&self, gender: Gender, age_months: f64, value: f64) -> Option<f64> {
        let point = self.at(gender, age_months)?;
        Some(100.0 * normal_cdf(point.z_score(value)))
    }
}

/// Standard normal cumulative distribution
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    const A: [f64; 5] = [0.254_829_592, -0.284_496_736, 1.421_413_741, -1.453_152_027, 1.061_405_429];
    const P: f64 = 0.327_591_1;
    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, a| acc * t + a) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
