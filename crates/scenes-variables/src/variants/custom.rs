//! Variables with a literal, comma-separated option list

use crate::multi_value::{
    MultiValueVariable, OptionsRequest, OptionsStream, ValueOptionsSource,
};
use crate::selection::VariableValueOption;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;

static KEY_VALUE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)\s:\s(.+)$").expect("valid key/value option pattern"));

/// Options parsed from the interpolated query
///
/// Entries are separated by commas (`\,` escapes a literal comma). An entry
/// of the form `label : value` yields distinct label and value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomOptions;

impl ValueOptionsSource for CustomOptions {
    const KIND: &'static str = "custom";

    fn get_value_options(&self, request: OptionsRequest) -> OptionsStream {
        stream::iter([Ok(parse_custom_options(&request.query))]).boxed()
    }
}

/// Variable whose options are written out in its query
pub type CustomVariable = MultiValueVariable<CustomOptions>;

/// Parse a custom option list
#[must_use]
pub fn parse_custom_options(query: &str) -> Vec<VariableValueOption> {
    split_unescaped_commas(query)
        .into_iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| match KEY_VALUE_REGEX.captures(&entry) {
            Some(caps) => VariableValueOption::new(caps[1].trim(), caps[2].trim()),
            None => VariableValueOption::same(entry.trim()),
        })
        .collect()
}

fn split_unescaped_commas(query: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = query.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => entries.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    entries.push(current);
    entries
}
