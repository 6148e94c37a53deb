//! Inclusion filters over entry ids and content types.

use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use kiln_common::PathId;

use crate::content::ContentType;
use crate::error::StoreError;

/// Selects entries by a glob over their id and, optionally, their type.
///
/// The glob is matched against the `/`-joined id, without any suffix, and
/// `*` does not cross segment boundaries. `**` selects every id.
#[derive(Clone)]
pub struct Filter {
    pattern: String,
    /// `None` selects every id.
    matcher: Option<GlobMatcher>,
    content_type: Option<ContentType>,
}

impl Filter {
    /// Compiles a filter.
    pub fn new(pattern: &str, content_type: Option<ContentType>) -> Result<Self, StoreError> {
        if pattern == "**" {
            return Ok(Self {
                pattern: pattern.to_string(),
                matcher: None,
                content_type,
            });
        }
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| StoreError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Some(glob.compile_matcher()),
            content_type,
        })
    }

    /// Selects every entry of `content_type`.
    pub fn all(content_type: ContentType) -> Self {
        Self {
            pattern: "**".to_string(),
            matcher: None,
            content_type: Some(content_type),
        }
    }

    /// Returns the glob source.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the content type this filter requires, if any.
    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// Returns `true` if an entry with this id and type is selected.
    pub fn matches(&self, id: &PathId, content_type: &ContentType) -> bool {
        if let Some(required) = &self.content_type {
            if required != content_type {
                return false;
            }
        }
        match &self.matcher {
            Some(matcher) => matcher.is_match(id.to_string()),
            None => true,
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content_type {
            Some(ct) => write!(f, "Filter({} : {ct})", self.pattern),
            None => write!(f, "Filter({})", self.pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_nested_ids_of_type() {
        let f = Filter::all(ContentType::SOURCE);
        assert!(f.matches(&PathId::parse("a"), &ContentType::SOURCE));
        assert!(f.matches(&PathId::parse("util/deep/list"), &ContentType::SOURCE));
        assert!(!f.matches(&PathId::parse("a"), &ContentType::INTERMEDIATE));
        assert!(!f.matches(&PathId::parse("a"), &ContentType::UNTYPED));
    }

    #[test]
    fn star_stays_within_segment() {
        let f = Filter::new("util/*", None).unwrap();
        assert!(f.matches(&PathId::parse("util/list"), &ContentType::SOURCE));
        assert!(!f.matches(&PathId::parse("util/deep/list"), &ContentType::SOURCE));
        assert!(!f.matches(&PathId::parse("main"), &ContentType::SOURCE));
    }

    #[test]
    fn untyped_filter_accepts_any_type() {
        let f = Filter::new("**", None).unwrap();
        assert!(f.matches(&PathId::parse("x"), &ContentType::UNTYPED));
        assert!(f.content_type().is_none());
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = Filter::new("a/[", None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPattern { .. }));
    }
}
