//! Reception color names mapped to display names and hex swatches.
//!
//! Suppliers spell colors inconsistently ("Écru", "ecru ", "ECRU"), so rules
//! are keyed by [`color_key`]: decomposed, stripped of combining marks,
//! lowercased and trimmed. A shop cannot hold two rules with the same key.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::instrument;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use ivy_core::{ColorRuleId, ShopId};

use super::ServiceContext;
use crate::db::ColorRuleRepository;
use crate::error::AppError;
use crate::models::{ColorRule, ColorRuleInput};

static HEX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?([0-9A-Fa-f]{6})$")
        .unwrap_or_else(|e| unreachable!("hex pattern is a valid regex: {e}"))
});

/// Case- and diacritic-insensitive lookup key for a color name.
#[must_use]
pub fn color_key(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// `#RRGGBB` (uppercase) from `RRGGBB` or `#rrggbb`.
fn normalize_hex(value: &str) -> Option<String> {
    HEX_PATTERN
        .captures(value.trim())
        .and_then(|c| c.get(1))
        .map(|m| format!("#{}", m.as_str().to_uppercase()))
}

/// How a color is displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorSwatch {
    pub name: String,
    pub hex: String,
}

/// Every color rule of a shop, indexed by [`color_key`].
#[derive(Debug, Clone, Default)]
pub struct ColorPalette {
    swatches: HashMap<String, ColorSwatch>,
}

impl ColorPalette {
    #[must_use]
    pub fn from_rules(rules: &[ColorRule]) -> Self {
        let swatches = rules
            .iter()
            .map(|rule| {
                let name = rule
                    .display_name
                    .clone()
                    .unwrap_or_else(|| rule.reception_name.clone());
                (
                    color_key(&rule.reception_name),
                    ColorSwatch {
                        name,
                        hex: rule.hex_value.clone(),
                    },
                )
            })
            .collect();
        Self { swatches }
    }

    /// Load the palette of a shop.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the rules cannot be read.
    pub async fn load(ctx: &ServiceContext, shop_id: ShopId) -> Result<Self, AppError> {
        let rules = ColorRuleRepository::new(&ctx.pool).list(shop_id).await?;
        Ok(Self::from_rules(&rules))
    }

    #[must_use]
    pub fn lookup(&self, color: &str) -> Option<&ColorSwatch> {
        self.swatches.get(&color_key(color))
    }

    /// Swatches for the given color names, keyed by the name as given.
    /// Unmapped colors are left out.
    #[must_use]
    pub fn swatches_for<'n>(
        &self,
        colors: impl IntoIterator<Item = &'n str>,
    ) -> HashMap<String, ColorSwatch> {
        colors
            .into_iter()
            .filter_map(|c| self.lookup(c).map(|s| (c.to_string(), s.clone())))
            .collect()
    }
}

/// Color rule CRUD with validation.
pub struct ColorRuleService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ColorRuleService<'a> {
    #[must_use]
    pub const fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn rules(&self) -> ColorRuleRepository<'_> {
        ColorRuleRepository::new(&self.ctx.pool)
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<ColorRule>, AppError> {
        Ok(self.rules().list(shop_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for invalid input and
    /// `AppError::Conflict` if the color is already mapped.
    #[instrument(skip(self, input), fields(shop_id = %shop_id))]
    pub async fn create(&self, shop_id: ShopId, input: ColorRuleInput) -> Result<ColorRule, AppError> {
        self.ctx.load_shop(shop_id).await?;
        let input = validate(input)?;
        self.ensure_unmapped(shop_id, &input.reception_name, None).await?;
        Ok(self.rules().create(shop_id, &input).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown rule, plus the errors of
    /// [`Self::create`].
    #[instrument(skip(self, input), fields(rule_id = %id))]
    pub async fn update(&self, id: ColorRuleId, input: ColorRuleInput) -> Result<ColorRule, AppError> {
        let existing = self
            .rules()
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("color rule {id}")))?;
        let input = validate(input)?;
        self.ensure_unmapped(existing.shop_id, &input.reception_name, Some(id))
            .await?;
        Ok(self.rules().update(id, &input).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown rule.
    pub async fn delete(&self, id: ColorRuleId) -> Result<(), AppError> {
        self.rules().delete(id).await.map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => AppError::NotFound(format!("color rule {id}")),
            other => other,
        })
    }

    async fn ensure_unmapped(
        &self,
        shop_id: ShopId,
        reception_name: &str,
        except: Option<ColorRuleId>,
    ) -> Result<(), AppError> {
        let key = color_key(reception_name);
        let taken = self
            .rules()
            .list(shop_id)
            .await?
            .into_iter()
            .any(|rule| Some(rule.id) != except && color_key(&rule.reception_name) == key);
        if taken {
            return Err(AppError::Conflict(format!(
                "color \"{reception_name}\" is already mapped"
            )));
        }
        Ok(())
    }
}

/// Trim names, drop an empty display name and normalize the hex value.
fn validate(input: ColorRuleInput) -> Result<ColorRuleInput, AppError> {
    let reception_name = input.reception_name.trim().to_string();
    if reception_name.is_empty() {
        return Err(AppError::BadRequest("reception_name is required".to_string()));
    }
    let hex_value = normalize_hex(&input.hex_value).ok_or_else(|| {
        AppError::BadRequest(format!("invalid hex color: {}", input.hex_value))
    })?;
    let display_name = input
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(ColorRuleInput {
        reception_name,
        display_name,
        hex_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(reception_name: &str, display_name: Option<&str>, hex: &str) -> ColorRule {
        ColorRule {
            id: ColorRuleId::generate(),
            shop_id: ShopId::generate(),
            reception_name: reception_name.to_string(),
            display_name: display_name.map(str::to_string),
            hex_value: hex.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_color_key_ignores_case_accents_and_padding() {
        assert_eq!(color_key("  Écru "), "ecru");
        assert_eq!(color_key("ECRU"), "ecru");
        assert_eq!(color_key("Bleu Pétrole"), "bleu petrole");
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("#aabbcc").as_deref(), Some("#AABBCC"));
        assert_eq!(normalize_hex("1a2B3c").as_deref(), Some("#1A2B3C"));
        assert_eq!(normalize_hex("#abc"), None);
        assert_eq!(normalize_hex("#GGGGGG"), None);
    }

    #[test]
    fn test_palette_lookup_is_insensitive() {
        let palette = ColorPalette::from_rules(&[
            rule("Écru", Some("Ivoire"), "#F3EFE0"),
            rule("Noir", None, "#000000"),
        ]);

        let ecru = palette.lookup("ecru");
        assert_eq!(ecru.map(|s| s.name.as_str()), Some("Ivoire"));
        assert_eq!(palette.lookup("NOIR").map(|s| s.name.as_str()), Some("Noir"));
        assert!(palette.lookup("Rouge").is_none());
    }

    #[test]
    fn test_swatches_for_keeps_given_names() {
        let palette = ColorPalette::from_rules(&[rule("Noir", None, "#000000")]);
        let swatches = palette.swatches_for(["noir", "Rouge"]);
        assert_eq!(swatches.len(), 1);
        assert_eq!(swatches.get("noir").map(|s| s.hex.as_str()), Some("#000000"));
    }

    #[test]
    fn test_validate_trims_and_rejects() {
        let valid = validate(ColorRuleInput {
            reception_name: "  Noir ".to_string(),
            display_name: Some("  ".to_string()),
            hex_value: "000000".to_string(),
        });
        let valid = valid.ok();
        assert_eq!(valid.as_ref().map(|v| v.reception_name.as_str()), Some("Noir"));
        assert_eq!(valid.as_ref().and_then(|v| v.display_name.clone()), None);
        assert_eq!(valid.as_ref().map(|v| v.hex_value.as_str()), Some("#000000"));

        let blank = validate(ColorRuleInput {
            reception_name: " ".to_string(),
            display_name: None,
            hex_value: "#000000".to_string(),
        });
        assert!(matches!(blank, Err(AppError::BadRequest(_))));

        let bad_hex = validate(ColorRuleInput {
            reception_name: "Noir".to_string(),
            display_name: None,
            hex_value: "black".to_string(),
        });
        assert!(matches!(bad_hex, Err(AppError::BadRequest(_))));
    }
}
