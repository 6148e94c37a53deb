//! Suffix to content-type associations.

use std::collections::BTreeMap;

use crate::content::ContentType;

/// Leading bytes that mark a `.bin` container as holding intermediate code.
pub const INTERMEDIATE_MAGIC: &[u8] = b"\x7fKIL";

/// Suffix used when materializing a content type the registry has no
/// preferred suffix for.
pub const DEFAULT_SUFFIX: &str = "dat";

/// One suffix association.
///
/// A suffix may carry several associations; those with a `magic` prefix are
/// tried first against the artifact's leading bytes and the one without a
/// prefix is the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Physical suffix without the leading dot.
    pub suffix: String,
    /// Type assigned to matching artifacts.
    pub content_type: ContentType,
    /// Leading bytes required for this association to apply.
    pub magic: Option<Vec<u8>>,
}

impl Association {
    /// Creates an unconditional association.
    pub fn new(suffix: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            suffix: suffix.into(),
            content_type,
            magic: None,
        }
    }

    /// Restricts the association to artifacts starting with `magic`.
    pub fn with_magic(mut self, magic: impl Into<Vec<u8>>) -> Self {
        self.magic = Some(magic.into());
        self
    }
}

/// An immutable mapping between physical suffixes and content types.
///
/// Built once per project and shared by its roots. Lookups are deterministic:
/// an unknown suffix always yields [`ContentType::UNTYPED`], and the inverse
/// mapping always yields the first suffix registered for a type.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    by_suffix: BTreeMap<String, Vec<Association>>,
    suffixes: Vec<(ContentType, String)>,
}

impl Registry {
    /// Creates a registry with no associations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates the default registry.
    ///
    /// `src` is source, `vc` is verification, `il` is intermediate, and `bin`
    /// is intermediate when it starts with [`INTERMEDIATE_MAGIC`] and binary
    /// otherwise.
    pub fn standard() -> Self {
        Self::empty()
            .with(Association::new("src", ContentType::SOURCE))
            .with(Association::new("vc", ContentType::VERIFICATION))
            .with(Association::new("il", ContentType::INTERMEDIATE))
            .with(Association::new("bin", ContentType::INTERMEDIATE).with_magic(INTERMEDIATE_MAGIC))
            .with(Association::new("bin", ContentType::BINARY))
    }

    /// Returns the registry extended with `assoc`.
    ///
    /// Magic associations are kept ahead of the fallback for their suffix.
    pub fn with(mut self, assoc: Association) -> Self {
        if !self
            .suffixes
            .iter()
            .any(|(ct, _)| *ct == assoc.content_type)
        {
            self.suffixes
                .push((assoc.content_type.clone(), assoc.suffix.clone()));
        }
        let list = self.by_suffix.entry(assoc.suffix.clone()).or_default();
        if assoc.magic.is_some() {
            let pos = list.iter().take_while(|a| a.magic.is_some()).count();
            list.insert(pos, assoc);
        } else {
            list.retain(|a| a.magic.is_some());
            list.push(assoc);
        }
        self
    }

    /// Returns `true` if `suffix` has at least one association.
    pub fn is_recognized(&self, suffix: &str) -> bool {
        self.by_suffix.contains_key(suffix)
    }

    /// Returns `true` if assigning a type to `suffix` requires its bytes.
    pub fn is_ambiguous(&self, suffix: &str) -> bool {
        self.by_suffix
            .get(suffix)
            .is_some_and(|list| list.iter().any(|a| a.magic.is_some()))
    }

    /// Assigns a content type to an artifact with the given suffix.
    ///
    /// `leading_bytes` is only called for ambiguous suffixes; when it yields
    /// nothing (the artifact cannot be read or does not exist yet) the
    /// suffix's fallback association applies.
    pub fn associate<F>(&self, suffix: &str, leading_bytes: F) -> ContentType
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        let Some(list) = self.by_suffix.get(suffix) else {
            return ContentType::UNTYPED;
        };
        if list.iter().any(|a| a.magic.is_some()) {
            if let Some(bytes) = leading_bytes() {
                let hit = list.iter().find(|a| {
                    a.magic
                        .as_deref()
                        .is_some_and(|magic| bytes.starts_with(magic))
                });
                if let Some(assoc) = hit {
                    return assoc.content_type.clone();
                }
            }
        }
        list.iter()
            .find(|a| a.magic.is_none())
            .map(|a| a.content_type.clone())
            .unwrap_or(ContentType::UNTYPED)
    }

    /// Returns `true` if some suffix maps back to `content_type`, so that
    /// artifacts created with that type keep it after a rescan.
    pub fn materializes(&self, content_type: &ContentType) -> bool {
        self.suffixes.iter().any(|(ct, _)| ct == content_type)
    }

    /// Returns the suffix used to materialize new artifacts of `content_type`.
    pub fn suffix_for(&self, content_type: &ContentType) -> &str {
        self.suffixes
            .iter()
            .find(|(ct, _)| ct == content_type)
            .map(|(_, suffix)| suffix.as_str())
            .unwrap_or(DEFAULT_SUFFIX)
    }

    /// Returns the longest magic prefix any association checks for.
    pub fn peek_len(&self) -> usize {
        self.by_suffix
            .values()
            .flatten()
            .filter_map(|a| a.magic.as_ref().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}
