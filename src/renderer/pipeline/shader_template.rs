//! Marker-based shader text composition.
//!
//! Skeleton shaders carry marker comments such as `//Normal::Dec`. Each
//! optional feature substitutes its own markers with declaration or
//! implementation lines; a marker nobody substitutes stays behind as a
//! harmless comment.
//!
//! A marker is a line whose trimmed text is `//` immediately followed by one
//! or more `::`-separated identifiers, the first starting with an uppercase
//! letter. Ordinary comments (`// like this`) are never markers.

use smallvec::SmallVec;

use crate::errors::{RenderError, Result};

/// Which occurrences of a marker are replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubstitutePolicy {
    #[default]
    First,
    All,
}

/// Outcome of [`substitute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub result: String,
    pub success: bool,
}

/// Replaces `marker` with `replacements` joined by newlines.
///
/// A missing marker is not an error: the source comes back unchanged with
/// `success == false`. The marker itself is consumed, so repeating a call
/// after a successful substitution is a no-op.
pub fn substitute<S: AsRef<str>>(
    source: &str,
    marker: &str,
    replacements: &[S],
    policy: SubstitutePolicy,
) -> Substitution {
    if marker.is_empty() || !source.contains(marker) {
        return Substitution {
            result: source.to_string(),
            success: false,
        };
    }
    let joined = replacements
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<&str>>()
        .join("\n");
    let result = match policy {
        SubstitutePolicy::First => source.replacen(marker, &joined, 1),
        SubstitutePolicy::All => source.replace(marker, &joined),
    };
    Substitution {
        result,
        success: true,
    }
}

/// Returns the marker named by `line`, if it is a marker line.
#[must_use]
pub fn parse_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let body = trimmed.strip_prefix("//")?;
    if !body.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let valid = body.split("::").all(|part| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    valid.then_some(trimmed)
}

/// A skeleton shader whose markers are known to be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderTemplate {
    name: String,
    source: String,
    markers: SmallVec<[String; 16]>,
}

impl ShaderTemplate {
    /// Scans `source` for markers, rejecting any that appear twice.
    pub fn parse(name: &str, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut markers: SmallVec<[String; 16]> = SmallVec::new();
        for marker in source.lines().filter_map(parse_marker) {
            if markers.iter().any(|m| m == marker) {
                return Err(RenderError::DuplicateMarker {
                    template: name.to_string(),
                    marker: marker.to_string(),
                });
            }
            markers.push(marker.to_string());
        }
        Ok(Self {
            name: name.to_string(),
            source,
            markers,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn into_source(self) -> String {
        self.source
    }

    /// Markers in order of appearance.
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    #[must_use]
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn absent_marker_leaves_source_untouched() {
        let out = substitute("fn main() {}", "//Color::Dec", NONE, SubstitutePolicy::First);
        assert_eq!(out.result, "fn main() {}");
        assert!(!out.success);
    }

    #[test]
    fn marker_is_consumed() {
        let src = "a\n//Color::Impl\nb";
        let first = substitute(src, "//Color::Impl", &["x", "y"], SubstitutePolicy::First);
        assert!(first.success);
        assert_eq!(first.result, "a\nx\ny\nb");

        let second = substitute(&first.result, "//Color::Impl", &["x", "y"], SubstitutePolicy::First);
        assert!(!second.success);
        assert_eq!(second.result, first.result);
    }

    #[test]
    fn policy_controls_occurrences() {
        let src = "//M\n//M";
        assert_eq!(substitute(src, "//M", &["a"], SubstitutePolicy::First).result, "a\n//M");
        assert_eq!(substitute(src, "//M", &["a"], SubstitutePolicy::All).result, "a\na");
    }

    #[test]
    fn marker_lines_are_recognised() {
        assert_eq!(parse_marker("  //Normal::Dec"), Some("//Normal::Dec"));
        assert_eq!(parse_marker("//VertexInput"), Some("//VertexInput"));
        assert_eq!(parse_marker("// optional normal"), None);
        assert_eq!(parse_marker("//Normal::"), None);
        assert_eq!(parse_marker("let x = 1; //Normal::Dec"), None);
    }

    #[test]
    fn duplicate_markers_are_rejected() {
        let err = ShaderTemplate::parse("t", "//Color::Dec\nfoo\n  //Color::Dec").unwrap_err();
        assert!(matches!(err, RenderError::DuplicateMarker { .. }));

        let ok = ShaderTemplate::parse("t", "//Color::Dec\n//Color::Impl").unwrap();
        assert_eq!(ok.markers(), &["//Color::Dec".to_string(), "//Color::Impl".to_string()]);
        assert!(ok.has_marker("//Color::Impl"));
    }
}
