//! Ordered attrition counters
//!
//! Each modifier reports why patients left the population or cohort. Steps
//! keep the order in which they were first recorded so the end-of-run report
//! reads as a funnel.

use std::fmt::Write;

/// Ordered list of named patient counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrition {
    steps: Vec<(String, u64)>,
}

impl Attrition {
    /// Create an empty counter list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step with a zero count so it appears in the report
    pub fn declare(&mut self, step: &str) {
        if !self.steps.iter().any(|(s, _)| s == step) {
            self.steps.push((step.to_string(), 0));
        }
    }

    /// Count one patient for `step`
    pub fn record(&mut self, step: &str) {
        self.add(step, 1);
    }

    /// Count `n` patients for `step`
    pub fn add(&mut self, step: &str, n: u64) {
        if let Some((_, count)) = self.steps.iter_mut().find(|(s, _)| s == step) {
            *count += n;
        } else {
            self.steps.push((step.to_string(), n));
        }
    }

    /// Count for `step`, zero when unknown
    #[must_use]
    pub fn get(&self, step: &str) -> u64 {
        self.steps
            .iter()
            .find(|(s, _)| s == step)
            .map_or(0, |(_, c)| *c)
    }

    /// Steps in first-recorded order
    pub fn steps(&self) -> impl Iterator<Item = (&str, u64)> {
        self.steps.iter().map(|(s, c)| (s.as_str(), *c))
    }

    /// Fold another list into this one, keeping this list's order first
    pub fn merge(&mut self, other: Self) {
        for (step, count) in other.steps {
            self.add(&step, count);
        }
    }

    /// Human readable funnel
    #[must_use]
    pub fn render(&self, title: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{title}:");
        for (step, count) in self.steps() {
            let _ = writeln!(out, "  {step}: {count}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_order() {
        let mut a = Attrition::new();
        a.declare("patients");
        a.record("run-in too short");
        let mut b = Attrition::new();
        b.add("patients", 3);
        b.record("age");
        a.merge(b);
        let steps: Vec<_> = a.steps().collect();
        assert_eq!(steps, vec![("patients", 3), ("run-in too short", 1), ("age", 1)]);
    }
}
