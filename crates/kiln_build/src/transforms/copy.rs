use crate::transform::{Product, SourceUnit, Transform, TransformError};

/// Writes every source's bytes unchanged to its target.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn name(&self) -> &str {
        super::COPY
    }

    fn apply(&mut self, batch: &[SourceUnit]) -> Result<Vec<Product>, TransformError> {
        Ok(batch
            .iter()
            .map(|unit| Product {
                id: unit.key.id.clone(),
                content: unit.content.clone(),
            })
            .collect())
    }
}
