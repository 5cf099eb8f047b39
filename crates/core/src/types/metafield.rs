//! Metafield identity and values attached to variants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A metafield identity: `namespace.key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetafieldKey {
    pub namespace: String,
    pub key: String,
}

impl MetafieldKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// The `namespace.key` form used for configuration matching.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }

    /// Case-insensitive exact match on `namespace.key`.
    #[must_use]
    pub fn matches(&self, namespace: &str, key: &str) -> bool {
        self.namespace.eq_ignore_ascii_case(namespace) && self.key.eq_ignore_ascii_case(key)
    }
}

impl std::fmt::Display for MetafieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.key)
    }
}

/// A single metafield value on a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantMetafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
}

/// All metafields known for one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetafieldSet(Vec<VariantMetafield>);

impl MetafieldSet {
    #[must_use]
    pub const fn new(fields: Vec<VariantMetafield>) -> Self {
        Self(fields)
    }

    /// Value for `namespace.key`, identity compared case-insensitively.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|m| {
                m.namespace.eq_ignore_ascii_case(namespace) && m.key.eq_ignore_ascii_case(key)
            })
            .map(|m| m.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariantMetafield> {
        self.0.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Project onto configured display names, dropping anything that is not
    /// configured. The result is what gets stored on order items.
    #[must_use]
    pub fn to_display_map(&self, config: &[(MetafieldKey, String)]) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|m| {
                config
                    .iter()
                    .find(|(key, _)| key.matches(&m.namespace, &m.key))
                    .map(|(_, display)| (display.clone(), m.value.clone()))
            })
            .collect()
    }
}

impl FromIterator<VariantMetafield> for MetafieldSet {
    fn from_iter<I: IntoIterator<Item = VariantMetafield>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
