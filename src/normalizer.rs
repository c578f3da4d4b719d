//! Attribute-name formatting and normalization.

use std::collections::HashMap;

/// Formats raw attribute path segments into a dotted attribute path.
///
/// Each segment gets its first letter lower-cased: `["Address", "ZipCode"]`
/// becomes `address.zipCode`.
pub fn format_attribute<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|segment| lower_first(segment.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

fn lower_first(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Maps a formatted attribute path to the entity's canonical field name.
pub trait AttributeNormalizer: Send + Sync {
    fn normalize(&self, entity: &str, attribute: &str) -> String;
}

/// Leaves attribute paths unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl AttributeNormalizer for IdentityNormalizer {
    fn normalize(&self, _entity: &str, attribute: &str) -> String {
        attribute.to_string()
    }
}

/// Looks attribute paths up in a per-entity mapping, falling back to the path itself.
#[derive(Debug, Clone, Default)]
pub struct MappedNormalizer {
    mappings: HashMap<String, HashMap<String, String>>,
}

impl MappedNormalizer {
    pub fn new(mappings: HashMap<String, HashMap<String, String>>) -> Self {
        Self { mappings }
    }
}

impl AttributeNormalizer for MappedNormalizer {
    fn normalize(&self, entity: &str, attribute: &str) -> String {
        self.mappings
            .get(entity)
            .and_then(|fields| fields.get(attribute))
            .cloned()
            .unwrap_or_else(|| attribute.to_string())
    }
}
