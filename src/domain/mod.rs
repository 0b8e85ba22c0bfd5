//! Domain logic for rune yield and crafting profit lives here.

pub mod entities;
pub mod estimator;
pub mod recipe;
pub mod session;
pub mod stats;

#[allow(unused_imports)]
pub use entities::{
    CalculateRequest, CalculateResponse, CoefficientRecord, CoefficientSnapshot, Ingredient,
    IngredientPrice, IngredientPriceUpdate, IngredientPrices, ItemDetails, ItemId, ItemSummary,
    Language, Profession, ProfitItem, ProfitPage, ProfitQuery, RuneBreakdown, RunePrice,
    RunePrices, Stat,
};
#[allow(unused_imports)]
pub use estimator::{
    clamp_coefficient, clamp_cost, clamp_rune_price, derive_metrics_from_breakdown,
    resolve_rune_name, sanitize_numeric_input, LiveMetrics,
};
#[allow(unused_imports)]
pub use recipe::{recipe_cost, RecipeCost};
#[allow(unused_imports)]
pub use session::CalculatorSession;
