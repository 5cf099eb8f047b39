//! Variant metafields via the GraphQL `nodes` query.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use ivy_core::{MetafieldKey, MetafieldSet, ShopifyVariantId, VariantMetafield};

use super::{ShopifyClient, ShopifyError};

/// Most IDs Shopify accepts in one `nodes` call.
const NODES_LIMIT: usize = 250;

const VARIANT_METAFIELDS_QUERY: &str = r"
query VariantMetafields($ids: [ID!]!) {
  nodes(ids: $ids) {
    ... on ProductVariant {
      id
      metafields(first: 100) {
        edges { node { namespace key value } }
      }
    }
  }
}
";

#[derive(Serialize)]
struct NodesVariables {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NodesData {
    nodes: Vec<Option<VariantNode>>,
}

#[derive(Debug, Deserialize)]
struct VariantNode {
    id: Option<String>,
    metafields: Option<MetafieldConnection>,
}

#[derive(Debug, Deserialize)]
struct MetafieldConnection {
    edges: Vec<MetafieldEdge>,
}

#[derive(Debug, Deserialize)]
struct MetafieldEdge {
    node: VariantMetafield,
}

/// Keep only metafields matching one of `keys` (case-insensitive).
fn filter_configured(
    fields: impl IntoIterator<Item = VariantMetafield>,
    keys: &[MetafieldKey],
) -> MetafieldSet {
    fields
        .into_iter()
        .filter(|m| keys.iter().any(|k| k.matches(&m.namespace, &m.key)))
        .collect()
}

impl ShopifyClient {
    /// Metafields of each variant, restricted to `keys`.
    ///
    /// Unconfigured metafields are dropped. Variants Shopify does not know
    /// are absent from the map. No request is made when either list is empty.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed GraphQL call.
    #[instrument(skip(self, variant_ids, keys), fields(variants = variant_ids.len(), keys = keys.len()))]
    pub async fn fetch_variant_metafields(
        &self,
        variant_ids: &[ShopifyVariantId],
        keys: &[MetafieldKey],
    ) -> Result<HashMap<ShopifyVariantId, MetafieldSet>, ShopifyError> {
        let mut result = HashMap::with_capacity(variant_ids.len());
        if variant_ids.is_empty() || keys.is_empty() {
            return Ok(result);
        }

        for chunk in variant_ids.chunks(NODES_LIMIT) {
            let variables = NodesVariables {
                ids: chunk.iter().map(ShopifyVariantId::to_gid).collect(),
            };
            let data: NodesData = self.graphql(VARIANT_METAFIELDS_QUERY, variables).await?;

            for node in data.nodes.into_iter().flatten() {
                let Some(id) = node.id.as_deref().and_then(ShopifyVariantId::from_gid) else {
                    continue;
                };
                let fields = node
                    .metafields
                    .map(|c| c.edges.into_iter().map(|e| e.node).collect::<Vec<_>>())
                    .unwrap_or_default();
                result.insert(id, filter_configured(fields, keys));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_response_parses_with_missing_nodes() {
        let data: NodesData = serde_json::from_str(
            r#"{"nodes": [
                {"id": "gid://shopify/ProductVariant/1", "metafields": {"edges": [
                    {"node": {"namespace": "custom", "key": "fabric", "value": "Lin"}}
                ]}},
                null
            ]}"#,
        )
        .unwrap();
        assert_eq!(data.nodes.len(), 2);
        assert!(data.nodes[1].is_none());
    }

    #[test]
    fn test_filter_configured_is_case_insensitive() {
        let fields = vec![
            VariantMetafield {
                namespace: "custom".to_string(),
                key: "Fabric".to_string(),
                value: "Lin".to_string(),
            },
            VariantMetafield {
                namespace: "custom".to_string(),
                key: "internal_note".to_string(),
                value: "x".to_string(),
            },
        ];
        let keys = vec![MetafieldKey::new("CUSTOM", "fabric")];
        let set = filter_configured(fields, &keys);
        assert_eq!(set.iter().count(), 1);
        assert_eq!(set.get("custom", "Fabric"), Some("Lin"));
    }
}
