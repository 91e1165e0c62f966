//! Variable reference scanning
//!
//! Recognized forms: `$name`, `[[name]]`, `[[name:format]]`, `${name}`,
//! `${name.fieldPath}`, `${name:format}` and `${name:format:arg}`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(\w+)|\[\[(\w+?)(?::(\w+))?\]\]|\$\{(\w+)(?:\.([^:^\}]+))?(?::([^\}]+))?\}")
        .expect("valid variable reference pattern")
});

/// One reference found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference<'a> {
    /// Full matched text
    pub matched: &'a str,
    /// Byte range of the match
    pub range: Range<usize>,
    /// Variable name
    pub name: &'a str,
    /// Field path after the first `.`
    pub field_path: Option<&'a str>,
    /// Format id, possibly followed by `:`-separated arguments
    pub format: Option<&'a str>,
}

/// Every reference in `template`, left to right
pub fn references(template: &str) -> impl Iterator<Item = VariableReference<'_>> {
    VARIABLE_REGEX.captures_iter(template).filter_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(4))?;
        Some(VariableReference {
            matched: whole.as_str(),
            range: whole.range(),
            name: name.as_str(),
            field_path: caps.get(5).map(|m| m.as_str()),
            format: caps.get(3).or_else(|| caps.get(6)).map(|m| m.as_str()),
        })
    })
}

/// Distinct referenced names in first-seen order
#[must_use]
pub fn referenced_names(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for reference in references(template) {
        if !names.iter().any(|n| n == reference.name) {
            names.push(reference.name.to_string());
        }
    }
    names
}

/// Check if `template` references any variable
#[must_use]
pub fn contains_references(template: &str) -> bool {
    VARIABLE_REGEX.is_match(template)
}

/// Replace every reference with the output of `replace`
pub fn replace_references(
    template: &str,
    mut replace: impl FnMut(&VariableReference<'_>) -> String,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for reference in references(template) {
        out.push_str(&template[last..reference.range.start]);
        out.push_str(&replace(&reference));
        last = reference.range.end;
    }
    out.push_str(&template[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn all_reference_forms() {
        let found: Vec<_> = references("$a [[b]] [[c:csv]] ${d} ${e.f.g} ${h:date:iso}").collect();
        let summary: Vec<_> = found
            .iter()
            .map(|r| (r.name, r.field_path, r.format))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a", None, None),
                ("b", None, None),
                ("c", None, Some("csv")),
                ("d", None, None),
                ("e", Some("f.g"), None),
                ("h", None, Some("date:iso")),
            ]
        );
    }

    #[test]
    fn names_are_distinct() {
        assert_eq!(referenced_names("$a-$b-${a}"), vec!["a", "b"]);
        assert!(!contains_references("plain $ text"));
    }

    #[test]
    fn replace_keeps_surrounding_text() {
        let out = replace_references("x=$a, y=${b:csv}!", |r| r.name.to_uppercase());
        assert_eq!(out, "x=A, y=B!");
    }

    proptest! {
        #[test]
        fn text_without_markers_is_untouched(s in "[a-zA-Z0-9 ,.:/_-]{0,64}") {
            let out = replace_references(&s, |_| String::from("X"));
            prop_assert_eq!(out, s);
        }
    }
}
