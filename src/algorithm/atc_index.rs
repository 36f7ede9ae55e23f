//! ATC prefix lookup with longest-prefix-wins and a `#` default entry

/// Prefix that matches every ATC code not covered by a more specific entry
pub const DEFAULT_PREFIX: &str = "#";

/// Ordered index from ATC prefixes to values.
///
/// The longest matching prefix wins; the `#` entry answers for codes no other
/// prefix covers. Every entry has a stable id (its insertion position, the
/// default entry comes last) so callers can tell whether two codes resolve to
/// the same rule.
#[derive(Debug, Clone)]
pub struct AtcIndex<T> {
    entries: Vec<(String, T)>,
    by_length: Vec<usize>,
    default: Option<T>,
}

impl<T> Default for AtcIndex<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_length: Vec::new(),
            default: None,
        }
    }
}

impl<T> AtcIndex<T> {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; a prefix can only be added once
    pub fn insert(&mut self, prefix: &str, value: T) -> Result<(), String> {
        if prefix == DEFAULT_PREFIX {
            if self.default.is_some() {
                return Err("duplicate default entry \"#\"".to_string());
            }
            self.default = Some(value);
            return Ok(());
        }
        if self.entries.iter().any(|(p, _)| p == prefix) {
            return Err(format!("duplicate ATC entry \"{prefix}\""));
        }
        self.entries.push((prefix.to_string(), value));
        self.by_length = (0..self.entries.len()).collect();
        let entries = &self.entries;
        self.by_length
            .sort_by(|&a, &b| entries[b].0.len().cmp(&entries[a].0.len()).then(a.cmp(&b)));
        Ok(())
    }

    /// Entry id and value for `atc`
    #[must_use]
    pub fn lookup(&self, atc: &str) -> Option<(usize, &T)> {
        self.by_length
            .iter()
            .find(|&&i| atc.starts_with(self.entries[i].0.as_str()))
            .map(|&i| (i, &self.entries[i].1))
            .or_else(|| self.default.as_ref().map(|v| (self.entries.len(), v)))
    }

    /// Prefix registered under `id`, `#` for the default entry
    #[must_use]
    pub fn prefix(&self, id: usize) -> &str {
        self.entries.get(id).map_or(DEFAULT_PREFIX, |(p, _)| p.as_str())
    }

    /// Number of entries including the default
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.default.is_some())
    }

    /// Whether the index has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
