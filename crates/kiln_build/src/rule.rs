//! Build rules: one declared mapping from a source root to a target root.

use std::collections::BTreeSet;

use kiln_store::{ContentType, EntryKey, Filter, RootId, RootSet};
use tracing::{debug, warn};

use crate::error::BuildError;
use crate::transform::{SourceUnit, Transform, TransformError};

/// Maps entries of one content type in one root to entries with the same
/// id and another content type in another root.
pub struct BuildRule {
    name: String,
    source: RootId,
    source_type: ContentType,
    includes: Filter,
    target: RootId,
    target_type: ContentType,
    transform: Box<dyn Transform>,
}

impl BuildRule {
    /// Creates a rule. `includes` selects source ids; its own content type,
    /// if any, is ignored in favor of `source_type`.
    pub fn new(
        source: RootId,
        source_type: ContentType,
        includes: Filter,
        target: RootId,
        target_type: ContentType,
        transform: Box<dyn Transform>,
    ) -> Self {
        let name = format!("{}:{}->{}", transform.name(), source_type, target_type);
        Self {
            name,
            source,
            source_type,
            includes,
            target,
            target_type,
            transform,
        }
    }

    /// Returns the name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the root read from.
    pub fn source(&self) -> RootId {
        self.source
    }

    /// Returns the root written to.
    pub fn target(&self) -> RootId {
        self.target
    }

    /// Returns the content type read.
    pub fn source_type(&self) -> &ContentType {
        &self.source_type
    }

    /// Returns the content type written.
    pub fn target_type(&self) -> &ContentType {
        &self.target_type
    }

    /// Returns `true` if `key` is a valid source for this rule.
    pub fn accepts(&self, key: &EntryKey) -> bool {
        key.root == self.source
            && key.content_type == self.source_type
            && self.includes.matches(&key.id, &key.content_type)
    }

    /// Returns the target that goes stale when `key` changes.
    ///
    /// Depends only on the rule's declaration, never on what exists.
    pub fn dependents_of(&self, key: &EntryKey) -> Option<EntryKey> {
        self.accepts(key)
            .then(|| EntryKey::new(self.target, key.id.clone(), self.target_type.clone()))
    }

    /// Runs the transform over the sources in `batch` this rule accepts and
    /// writes its products. Returns the keys written.
    ///
    /// Products for ids outside the batch are dropped.
    pub fn apply(
        &mut self,
        batch: &[EntryKey],
        roots: &mut RootSet,
    ) -> Result<Vec<EntryKey>, BuildError> {
        let mut units = Vec::new();
        for key in batch.iter().filter(|k| self.accepts(k)) {
            let root = roots
                .get_mut(key.root)
                .ok_or(BuildError::MissingRoot(key.root))?;
            let content = root.read(&key.id, &key.content_type)?;
            let Some(location) = root
                .get(&key.id, &key.content_type)?
                .map(|e| e.location().clone())
            else {
                continue;
            };
            units.push(SourceUnit {
                key: key.clone(),
                location,
                content,
            });
        }
        if units.is_empty() {
            return Ok(Vec::new());
        }

        debug!(rule = %self.name, batch = units.len(), "applying rule");
        let products = self.transform.apply(&units).map_err(|e| match e {
            TransformError::Structured(err) => BuildError::Transform(err),
            TransformError::Failed(source) => BuildError::Fatal {
                transform: self.name.clone(),
                source,
            },
        })?;

        let expected: BTreeSet<_> = units.iter().map(|u| &u.key.id).collect();
        let target = roots
            .get_mut(self.target)
            .ok_or(BuildError::MissingRoot(self.target))?;
        let mut written = Vec::with_capacity(products.len());
        for product in products {
            if !expected.contains(&product.id) {
                warn!(rule = %self.name, id = %product.id, "dropping product with no source in batch");
                continue;
            }
            target.write(&product.id, &self.target_type, product.content)?;
            written.push(EntryKey::new(
                self.target,
                product.id,
                self.target_type.clone(),
            ));
        }
        Ok(written)
    }
}

impl std::fmt::Debug for BuildRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildRule")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("includes", &self.includes.pattern())
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::CopyTransform;
    use kiln_common::PathId;

    fn rule(includes: &str) -> BuildRule {
        BuildRule::new(
            RootId(0),
            ContentType::SOURCE,
            Filter::new(includes, None).unwrap(),
            RootId(1),
            ContentType::INTERMEDIATE,
            Box::new(CopyTransform),
        )
    }

    #[test]
    fn dependents_of_maps_same_id() {
        let r = rule("**");
        let a = EntryKey::new(RootId(0), PathId::parse("pkg/a"), ContentType::SOURCE);
        assert_eq!(
            r.dependents_of(&a),
            Some(EntryKey::new(
                RootId(1),
                PathId::parse("pkg/a"),
                ContentType::INTERMEDIATE
            ))
        );
    }

    #[test]
    fn dependents_of_rejects_other_roots_and_types() {
        let r = rule("pkg/**");
        let id = PathId::parse("pkg/a");
        assert!(r
            .dependents_of(&EntryKey::new(RootId(1), id.clone(), ContentType::SOURCE))
            .is_none());
        assert!(r
            .dependents_of(&EntryKey::new(RootId(0), id, ContentType::BINARY))
            .is_none());
        assert!(r
            .dependents_of(&EntryKey::new(
                RootId(0),
                PathId::parse("other/a"),
                ContentType::SOURCE
            ))
            .is_none());
    }

    #[test]
    fn name_mentions_transform_and_types() {
        assert_eq!(rule("**").name(), "copy:source->intermediate");
    }
}
