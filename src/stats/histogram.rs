//! Multi-dimensional counter keyed by tuples of typed dimensions
//!
//! Every modifier tallies what it saw (rejection reasons, zero-duration
//! prescriptions per ATC and indication, BMI discrepancies...) in a
//! [`Histogram`]. Queries accept wildcards and key prefixes, so one histogram
//! can answer "how many for this ATC" as well as "how many in total".

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// One dimension of a histogram key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dim {
    /// Text label (ATC code, reason, measurement type...)
    Text(String),
    /// Integer label (year, age band, day...)
    Int(i64),
}

impl From<&str> for Dim {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Dim {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Dim {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for Dim {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Dim {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

/// Histogram key
pub type Key = SmallVec<[Dim; 3]>;

/// Accumulated observations for one key
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cell {
    /// Number of observations
    pub count: u64,
    /// Sum of observed values
    pub sum: f64,
}

impl Cell {
    fn absorb(&mut self, other: Self) {
        self.count += other.count;
        self.sum += other.sum;
    }

    /// Mean of observed values, zero when empty
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Counter keyed by tuples of [`Dim`]
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    cells: FxHashMap<Key, Cell>,
}

impl Histogram {
    /// Create an empty histogram
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation with `value` under `key`
    pub fn add(&mut self, key: &[Dim], value: f64) {
        self.cells
            .entry(key.iter().cloned().collect())
            .or_default()
            .absorb(Cell { count: 1, sum: value });
    }

    /// Record one observation with value 1 under `key`
    pub fn increment(&mut self, key: &[Dim]) {
        self.add(key, 1.0);
    }

    /// Exact lookup
    #[must_use]
    pub fn get(&self, key: &[Dim]) -> Cell {
        let key: Key = key.iter().cloned().collect();
        self.cells.get(&key).copied().unwrap_or_default()
    }

    /// Aggregate every key matching `pattern`.
    ///
    /// `None` positions match any dimension; keys longer than the pattern
    /// match on their prefix.
    #[must_use]
    pub fn query(&self, pattern: &[Option<Dim>]) -> Cell {
        let mut total = Cell::default();
        for (key, cell) in &self.cells {
            if key.len() < pattern.len() {
                continue;
            }
            let matches = pattern
                .iter()
                .zip(key.iter())
                .all(|(p, k)| p.as_ref().is_none_or(|p| p == k));
            if matches {
                total.absorb(*cell);
            }
        }
        total
    }

    /// Count of observations whose key starts with `prefix`
    #[must_use]
    pub fn count_prefix(&self, prefix: &[Dim]) -> u64 {
        let pattern: Vec<Option<Dim>> = prefix.iter().cloned().map(Some).collect();
        self.query(&pattern).count
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Fold another histogram into this one
    pub fn merge(&mut self, other: Self) {
        for (key, cell) in other.cells {
            self.cells.entry(key).or_default().absorb(cell);
        }
    }

    /// Entries sorted by key
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(&Key, &Cell)> {
        let mut entries: Vec<_> = self.cells.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_duration() -> Histogram {
        let mut h = Histogram::new();
        h.increment(&["zero".into(), "A10BA02".into(), "DM2".into()]);
        h.increment(&["zero".into(), "A10BA02".into(), "DM1".into()]);
        h.increment(&["zero".into(), "C09AA02".into(), "HT".into()]);
        h
    }

    #[test]
    fn test_wildcard_query() {
        let h = zero_duration();
        assert_eq!(h.query(&[Some("zero".into()), None, Some("DM2".into())]).count, 1);
        assert_eq!(h.query(&[None, Some("A10BA02".into())]).count, 2);
        assert_eq!(h.count_prefix(&["zero".into()]), 3);
    }

    #[test]
    fn test_merge_and_mean() {
        let mut a = Histogram::new();
        a.add(&["bmi".into(), 2010.into()], 20.0);
        let mut b = Histogram::new();
        b.add(&["bmi".into(), 2010.into()], 30.0);
        a.merge(b);
        let cell = a.get(&["bmi".into(), 2010.into()]);
        assert_eq!(cell.count, 2);
        assert!((cell.mean() - 25.0).abs() < f64::EPSILON);
    }
}
