//! Key-prefix isolation for services sharing one physical cache.
//!
//! Callers only ever see logical keys (`users:42:lists`). The physical key
//! stored in the backend is `<namespace>:<logical>`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Builds a namespace from a service name. A trailing `:` is accepted
    /// and normalised away.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim_end_matches(':');
        Self {
            prefix: format!("{trimmed}:"),
        }
    }

    pub fn name(&self) -> &str {
        self.prefix.trim_end_matches(':')
    }

    /// The raw prefix including the separator, e.g. `taskmaster:`.
    pub fn prefix(&self) -> &str { &self.prefix }

    pub fn add_prefix(&self, logical: &str) -> String {
        add_prefix(&self.prefix, logical)
    }

    /// Returns `None` for keys that belong to a different namespace.
    pub fn strip_prefix<'k>(&self, physical: &'k str) -> Option<&'k str> {
        strip_prefix(&self.prefix, physical)
    }

    /// Pattern matching every key of this namespace and nothing else.
    pub fn all_keys_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.prefix))
    }

    /// Lifts a caller pattern over the logical key space into the
    /// physical key space. The prefix itself is escaped so a namespace
    /// containing glob characters cannot widen the match.
    pub fn physical_pattern(&self, logical_pattern: &str) -> String {
        format!("{}{}", escape_glob(&self.prefix), logical_pattern)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn add_prefix(prefix: &str, logical: &str) -> String {
    format!("{prefix}{logical}")
}

pub fn strip_prefix<'k>(prefix: &str, physical: &'k str) -> Option<&'k str> {
    physical.strip_prefix(prefix)
}

/// Escapes the glob metacharacters understood by both Redis `SCAN MATCH`
/// and the `glob` crate. A lone `]` is literal in both dialects.
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '*' | '?' | '[' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_roundtrip() {
        let ns = Namespace::new("taskmaster");
        let physical = ns.add_prefix("users:7:lists");

        assert_eq!(physical, "taskmaster:users:7:lists");
        assert_eq!(ns.strip_prefix(&physical), Some("users:7:lists"));
    }

    #[test]
    fn test_trailing_separator_is_normalised() {
        assert_eq!(Namespace::new("auth:"), Namespace::new("auth"));
        assert_eq!(Namespace::new("auth:").prefix(), "auth:");
        assert_eq!(Namespace::new("auth").to_string(), "auth");
    }

    #[test]
    fn test_foreign_keys_are_not_stripped() {
        let ns = Namespace::new("taskmaster");

        assert_eq!(ns.strip_prefix("auth:users:7"), None);
        // a namespace that merely starts with the same letters is foreign
        assert_eq!(ns.strip_prefix("taskmaster2:users:7"), None);
    }

    #[test]
    fn test_physical_pattern() {
        let ns = Namespace::new("taskmaster");

        assert_eq!(ns.physical_pattern("users:7*"), "taskmaster:users:7*");
        assert_eq!(ns.all_keys_pattern(), "taskmaster:*");
    }

    #[test]
    fn test_glob_characters_in_namespace_are_escaped() {
        let ns = Namespace::new("svc*");

        assert_eq!(ns.all_keys_pattern(), "svc[*]:*");
        assert_eq!(escape_glob("a?b[c]"), "a[?]b[[]c]");
    }
}
