//! Build variable substitution for destination templates
//!
//! Supports `${NAME}` and `$NAME` references. Unknown variables are kept
//! verbatim.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref VARIABLE_PATTERN: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable pattern is valid");
}

/// Expand build variables in `template`
pub fn expand(template: &str, variables: &HashMap<String, String>) -> String {
    VARIABLE_PATTERN
        .replace_all(template, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match variables.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
