use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier the backend uses for items and ingredients.
pub type ItemId = i64;

/// One rolled stat on an item.
///
/// `value` is the current (user-adjustable) roll; `min`/`max` bound it but the
/// bound is not enforced. Negative values are a malus and never yield runes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rune_name: Option<String>,
}

impl Stat {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            min: value,
            max: value,
            rune_name: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_rune(mut self, rune_name: impl Into<String>) -> Self {
        self.rune_name = Some(rune_name.into());
        self
    }

    pub fn is_malus(&self) -> bool {
        self.value < 0.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunePrice {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl RunePrice {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            ..Self::default()
        }
    }
}

/// Rune market prices keyed by exact (case-sensitive) rune name.
pub type RunePrices = HashMap<String, RunePrice>;

/// Price lookup that treats an unknown rune as worthless.
pub fn rune_price(prices: &RunePrices, rune_name: &str) -> f64 {
    prices.get(rune_name).map(|entry| entry.price).unwrap_or(0.0)
}

/// Flattens rune prices into the `name -> price` map the calculate endpoint expects.
pub fn plain_rune_prices(prices: &RunePrices) -> HashMap<String, f64> {
    prices
        .iter()
        .map(|(name, entry)| (name.clone(), entry.price))
        .collect()
}

/// Per-stat rune yield as computed by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuneBreakdown {
    pub stat: String,
    #[serde(default)]
    pub rune_name: String,
    #[serde(default)]
    pub rune_image: Option<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub focus_rune_name: Option<String>,
    #[serde(default)]
    pub focus_image: Option<String>,
    #[serde(default)]
    pub focus_count: Option<f64>,
    #[serde(default)]
    pub focus_value: f64,
}

impl RuneBreakdown {
    pub fn new(stat: impl Into<String>, rune_name: impl Into<String>, count: f64) -> Self {
        Self {
            stat: stat.into(),
            rune_name: rune_name.into(),
            count,
            ..Self::default()
        }
    }

    pub fn with_focus(mut self, focus_count: f64) -> Self {
        self.focus_count = Some(focus_count);
        self
    }
}

/// One line of a crafting recipe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub img: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientPrice {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

pub type IngredientPrices = HashMap<ItemId, IngredientPrice>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngredientPriceUpdate {
    pub item_id: ItemId,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Search hit returned while typing an item name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub stats: Vec<Stat>,
    #[serde(default)]
    pub level: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub img: String,
    pub level: u32,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub stats: Vec<Stat>,
    #[serde(default)]
    pub recipe: Vec<Ingredient>,
    #[serde(default)]
    pub last_coefficient: Option<f64>,
    #[serde(default)]
    pub last_coefficient_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub item_level: u32,
    pub stats: Vec<Stat>,
    pub coefficient: f64,
    pub item_cost: f64,
    pub rune_prices: HashMap<String, f64>,
    pub lang: String,
    pub server: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculateResponse {
    #[serde(default)]
    pub total_estimated_value: f64,
    #[serde(default)]
    pub net_profit: f64,
    #[serde(default)]
    pub max_focus_profit: f64,
    #[serde(default)]
    pub best_focus_stat: Option<String>,
    #[serde(default)]
    pub breakdown: Vec<RuneBreakdown>,
    #[serde(default)]
    pub item_cost: f64,
    #[serde(default)]
    pub coefficient: f64,
}

/// Ranking row from the best-profit listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfitItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub img: String,
    pub level: u32,
    pub min_coefficient: f64,
    pub craft_cost: f64,
    pub estimated_rune_value: f64,
    #[serde(default)]
    pub value_at_100: f64,
    #[serde(default)]
    pub last_coefficient: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitPage {
    pub items: Vec<ProfitItem>,
    pub total: u32,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProfitQuery {
    pub types: Vec<String>,
    pub min_level: u32,
    pub max_level: u32,
    pub min_profit: f64,
    pub min_craft_cost: f64,
    pub page: u32,
    pub limit: u32,
    pub sort_by: String,
    pub sort_order: String,
}

impl Default for ProfitQuery {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            min_level: 1,
            max_level: 200,
            min_profit: 0.0,
            min_craft_cost: 0.0,
            page: 1,
            limit: 10,
            sort_by: "profit".to_string(),
            sort_order: "desc".to_string(),
        }
    }
}

/// Values recorded alongside a saved coefficient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSnapshot {
    pub coefficient: f64,
    pub item_cost: f64,
    pub total_value: f64,
    pub profit: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRecord {
    #[serde(alias = "created_at")]
    pub date: String,
    pub coefficient: f64,
}

/// Crafting professions and the item types their recipes produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Profession {
    Smith,
    Carver,
    Jeweller,
    Shoemaker,
    Tailor,
    Shieldsmith,
}

impl Profession {
    pub const ALL: [Profession; 6] = [
        Profession::Smith,
        Profession::Carver,
        Profession::Jeweller,
        Profession::Shoemaker,
        Profession::Tailor,
        Profession::Shieldsmith,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Profession::Smith => "smith",
            Profession::Carver => "carver",
            Profession::Jeweller => "jeweller",
            Profession::Shoemaker => "shoemaker",
            Profession::Tailor => "tailor",
            Profession::Shieldsmith => "shieldsmith",
        }
    }

    pub fn item_types(&self) -> &'static [&'static str] {
        match self {
            Profession::Smith => &[
                "Sword", "Dagger", "Hammer", "Shovel", "Axe", "Scythe", "Pickaxe",
            ],
            Profession::Carver => &["Bow", "Wand", "Staff"],
            Profession::Jeweller => &["Amulet", "Ring"],
            Profession::Shoemaker => &["Boots", "Belt"],
            Profession::Tailor => &["Hat", "Cloak", "Backpack"],
            Profession::Shieldsmith => &["Shield", "Trophy"],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|profession| profession.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
    Fr,
    Pt,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
            Language::Fr => "fr",
            Language::Pt => "pt",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "es" => Some(Language::Es),
            "en" => Some(Language::En),
            "fr" => Some(Language::Fr),
            "pt" => Some(Language::Pt),
            _ => None,
        }
    }
}

pub const DEFAULT_SERVER: &str = "Dakal";

pub const KNOWN_SERVERS: [&str; 12] = [
    "Dakal",
    "Brial",
    "Draconiros",
    "Hell Mina",
    "Imagiro",
    "Kourial",
    "Mikhal",
    "Orukam",
    "Rafal",
    "Salar",
    "Tal Kasha",
    "Tylezia",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_tolerates_missing_fields() {
        let raw = r#"{"stat": "Vitality", "rune_name": "Vi Rune", "count": 3.5}"#;
        let entry: RuneBreakdown = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.count, 3.5);
        assert_eq!(entry.focus_count, None);
        assert_eq!(entry.focus_value, 0.0);
    }

    #[test]
    fn ingredient_prices_accept_string_keys() {
        let raw = r#"{"421": {"price": 12}, "8": {"price": 3, "updated_at": null}}"#;
        let prices: IngredientPrices = serde_json::from_str(raw).unwrap();
        assert_eq!(prices[&421].price, 12.0);
        assert_eq!(prices[&8].updated_at, None);
    }

    #[test]
    fn item_type_uses_wire_name() {
        let raw = r#"{"id": 1, "name": "Gelano", "level": 60, "type": "Ring"}"#;
        let details: ItemDetails = serde_json::from_str(raw).unwrap();
        assert_eq!(details.item_type.as_deref(), Some("Ring"));
        assert!(details.recipe.is_empty());
    }

    #[test]
    fn unknown_rune_is_free() {
        let mut prices = RunePrices::new();
        prices.insert("Pa Rune".to_string(), RunePrice::new(4.0));
        assert_eq!(rune_price(&prices, "Pa Rune"), 4.0);
        assert_eq!(rune_price(&prices, "pa rune"), 0.0);
    }

    #[test]
    fn profession_lookup_is_case_insensitive() {
        assert_eq!(Profession::from_name("Jeweller"), Some(Profession::Jeweller));
        assert_eq!(Profession::Jeweller.item_types(), &["Amulet", "Ring"]);
        assert_eq!(Profession::from_name("baker"), None);
    }
}
