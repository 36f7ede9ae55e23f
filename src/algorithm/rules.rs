//! Parsing of the semicolon-delimited rule strings used in modifier settings
//!
//! Settings keep the compact notation of the workflow scripts, for example
//! `"R03BB06;-100;200"` or `"IPCI;365"`. Each modifier turns its strings into
//! typed rules once, when it is built, through a [`RuleParser`].

use crate::error::{Error, Result};
use crate::utils::date::{DateFormatConfig, Day, parse_day};

/// Field-by-field reader over one rule string
#[derive(Debug, Clone)]
pub struct RuleParser<'a> {
    modifier: &'a str,
    rule: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> RuleParser<'a> {
    /// Split `rule` on semicolons
    #[must_use]
    pub fn new(modifier: &'a str, rule: &'a str) -> Self {
        Self {
            modifier,
            rule,
            fields: rule.split(';').map(str::trim).collect(),
        }
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the rule has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|f| f.is_empty())
    }

    /// Configuration error mentioning the offending rule
    #[must_use]
    pub fn error(&self, message: impl AsRef<str>) -> Error {
        Error::config(self.modifier, format!("{} in rule \"{}\"", message.as_ref(), self.rule))
    }

    /// Fail unless the rule has between `min` and `max` fields
    pub fn expect_fields(&self, min: usize, max: usize) -> Result<()> {
        if self.len() < min || self.len() > max {
            return Err(self.error(format!("expected {min} to {max} fields, found {}", self.len())));
        }
        Ok(())
    }

    /// Non-empty text field
    pub fn text(&self, index: usize) -> Result<&'a str> {
        self.opt_text(index)
            .ok_or_else(|| self.error(format!("missing field {}", index + 1)))
    }

    /// Text field, `None` when absent or empty
    #[must_use]
    pub fn opt_text(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied().filter(|f| !f.is_empty())
    }

    /// Comma separated list field, empty when absent
    #[must_use]
    pub fn list(&self, index: usize) -> Vec<String> {
        self.opt_text(index)
            .map(split_list)
            .unwrap_or_default()
    }

    /// Required integer field
    pub fn int(&self, index: usize) -> Result<i32> {
        let text = self.text(index)?;
        text.parse()
            .map_err(|_| self.error(format!("\"{text}\" is not an integer")))
    }

    /// Optional integer field
    pub fn opt_int(&self, index: usize) -> Result<Option<i32>> {
        self.opt_text(index)
            .map(|text| {
                text.parse()
                    .map_err(|_| self.error(format!("\"{text}\" is not an integer")))
            })
            .transpose()
    }

    /// Required number field
    pub fn float(&self, index: usize) -> Result<f64> {
        let text = self.text(index)?;
        text.parse()
            .map_err(|_| self.error(format!("\"{text}\" is not a number")))
    }

    /// Optional number field
    pub fn opt_float(&self, index: usize) -> Result<Option<f64>> {
        self.opt_text(index)
            .map(|text| {
                text.parse()
                    .map_err(|_| self.error(format!("\"{text}\" is not a number")))
            })
            .transpose()
    }

    /// Required date field
    pub fn date(&self, index: usize, formats: &DateFormatConfig) -> Result<Day> {
        let text = self.text(index)?;
        parse_day(text, formats).ok_or_else(|| self.error(format!("\"{text}\" is not a date")))
    }
}

/// Split a comma separated list, dropping empty entries
#[must_use]
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse every rule of a settings list with `parse`
pub fn parse_all<T>(
    modifier: &str,
    rules: &[String],
    mut parse: impl FnMut(&RuleParser<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    rules
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|rule| parse(&RuleParser::new(modifier, rule)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        let parser = RuleParser::new("Test", "R03BB06; -100 ;200;;A,B");
        assert_eq!(parser.text(0).unwrap(), "R03BB06");
        assert_eq!(parser.int(1).unwrap(), -100);
        assert_eq!(parser.opt_int(3).unwrap(), None);
        assert_eq!(parser.list(4), vec!["A", "B"]);
        assert!(parser.int(0).is_err());
        assert!(parser.text(7).is_err());
    }

    #[test]
    fn test_error_mentions_rule() {
        let parser = RuleParser::new("ExposureDefinition", "A10;x");
        let message = parser.int(1).unwrap_err().to_string();
        assert!(message.contains("ExposureDefinition"));
        assert!(message.contains("A10;x"));
    }
}
