//! Drug groups and combination definitions
//!
//! A drug group names a set of ATC prefixes. A combination names the groups
//! that must be active at the same time, plus a minimum duration. Both are
//! parsed once from settings and never change during a run.

use smallvec::SmallVec;

use crate::algorithm::rules::parse_all;
use crate::error::Result;

/// Named set of ATC prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugGroup {
    /// Unique group name
    pub name: String,
    /// ATC prefixes belonging to the group
    pub atc_prefixes: Vec<String>,
}

impl DrugGroup {
    /// Whether `atc` belongs to the group
    #[must_use]
    pub fn contains(&self, atc: &str) -> bool {
        self.atc_prefixes.iter().any(|p| atc.starts_with(p.as_str()))
    }
}

/// Named set of groups that must be active together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    /// Unique combination name, used as the ATC of synthetic prescriptions
    pub name: String,
    /// Required group names
    pub groups: Vec<String>,
    /// Minimum duration of a combination episode, in days
    pub min_duration: i32,
}

/// Parsed group and combination configuration
#[derive(Debug, Clone, Default)]
pub struct DrugGroups {
    groups: Vec<DrugGroup>,
    combinations: Vec<Combination>,
}

impl DrugGroups {
    /// Parse `"NAME;ATC1,ATC2"` groups and `"NAME;GROUP1,GROUP2[;minDuration]"` combinations
    pub fn parse(modifier: &str, groups: &[String], combinations: &[String]) -> Result<Self> {
        let groups = parse_all(modifier, groups, |rule| {
            rule.expect_fields(2, 2)?;
            let atc_prefixes = rule.list(1);
            if atc_prefixes.is_empty() {
                return Err(rule.error("group without ATC codes"));
            }
            Ok(DrugGroup {
                name: rule.text(0)?.to_string(),
                atc_prefixes,
            })
        })?;

        let combinations = parse_all(modifier, combinations, |rule| {
            rule.expect_fields(2, 3)?;
            let required = rule.list(1);
            if required.len() < 2 {
                return Err(rule.error("a combination needs at least two groups"));
            }
            if let Some(unknown) = required.iter().find(|g| !groups.iter().any(|d| &d.name == *g)) {
                return Err(rule.error(format!("unknown drug group \"{unknown}\"")));
            }
            let min_duration = rule.opt_int(2)?.unwrap_or(0);
            if min_duration < 0 {
                return Err(rule.error("negative minimum duration"));
            }
            Ok(Combination {
                name: rule.text(0)?.to_string(),
                groups: required,
                min_duration,
            })
        })?;

        check_unique(modifier, groups.iter().map(|g| g.name.as_str()), "drug group")?;
        check_unique(modifier, combinations.iter().map(|c| c.name.as_str()), "combination")?;

        Ok(Self {
            groups,
            combinations,
        })
    }

    /// Names of the groups `atc` belongs to
    #[must_use]
    pub fn groups_for(&self, atc: &str) -> SmallVec<[String; 2]> {
        self.groups
            .iter()
            .filter(|g| g.contains(atc))
            .map(|g| g.name.clone())
            .collect()
    }

    /// Defined groups
    #[must_use]
    pub fn groups(&self) -> &[DrugGroup] {
        &self.groups
    }

    /// Defined combinations
    #[must_use]
    pub fn combinations(&self) -> &[Combination] {
        &self.combinations
    }
}

fn check_unique<'a>(modifier: &str, names: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = rustc_hash::FxHashSet::default();
    for name in names {
        if !seen.insert(name) {
            return Err(crate::error::Error::config(
                modifier,
                format!("duplicate {what} name \"{name}\""),
            ));
        }
    }
    Ok(())
}

/// Parse a free combination label such as `_A10BA02/A10BH01` into its components
#[must_use]
pub fn free_combination_components(label: &str) -> Option<Vec<String>> {
    let body = label.strip_prefix('_')?;
    let components: Vec<String> = body
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (components.len() >= 2).then_some(components)
}
