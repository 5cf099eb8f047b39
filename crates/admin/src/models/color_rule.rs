//! Color name mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ivy_core::{ColorRuleId, ShopId};

/// Maps a color name as received from the supplier to a display name and
/// swatch color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorRule {
    pub id: ColorRuleId,
    pub shop_id: ShopId,
    pub reception_name: String,
    pub display_name: Option<String>,
    /// `#RRGGBB`
    pub hex_value: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or replacing a color rule.
#[derive(Debug, Clone, Deserialize)]
pub struct ColorRuleInput {
    pub reception_name: String,
    pub display_name: Option<String>,
    pub hex_value: String,
}
