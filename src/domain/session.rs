use super::entities::{
    plain_rune_prices, CalculateRequest, CalculateResponse, Ingredient, ItemDetails, ItemSummary,
    Language, RunePrice, RunePrices, Stat, DEFAULT_SERVER,
};
use super::estimator::{
    clamp_coefficient, clamp_cost, clamp_rune_price, derive_metrics_from_breakdown, LiveMetrics,
    DEFAULT_COEFFICIENT,
};
use super::stats::{prepare_stats, set_stat_value};

/// Level assumed until item details arrive.
pub const DEFAULT_ITEM_LEVEL: u32 = 200;

/// State of the calculator for one selected item.
///
/// Every edit bumps `revision`; a server result is only accepted for the
/// revision it was requested at, so a slow response never overwrites newer input.
#[derive(Clone, Debug)]
pub struct CalculatorSession {
    pub language: Language,
    pub server: String,
    pub selected_item: Option<ItemSummary>,
    pub item_level: u32,
    pub stats: Vec<Stat>,
    pub recipe: Vec<Ingredient>,
    pub cost: f64,
    /// `None` while the saved coefficient is loading or the field is empty.
    pub coefficient: Option<f64>,
    pub last_coefficient_date: Option<String>,
    pub rune_prices: RunePrices,
    pub result: Option<CalculateResponse>,
    revision: u64,
    calculated_revision: Option<u64>,
}

impl Default for CalculatorSession {
    fn default() -> Self {
        Self::new(Language::default(), DEFAULT_SERVER)
    }
}

impl CalculatorSession {
    pub fn new(language: Language, server: impl Into<String>) -> Self {
        Self {
            language,
            server: server.into(),
            selected_item: None,
            item_level: DEFAULT_ITEM_LEVEL,
            stats: Vec::new(),
            recipe: Vec::new(),
            cost: 0.0,
            coefficient: Some(DEFAULT_COEFFICIENT),
            last_coefficient_date: None,
            rune_prices: RunePrices::new(),
            result: None,
            revision: 0,
            calculated_revision: None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether inputs changed since the last accepted server result.
    pub fn needs_calculation(&self) -> bool {
        self.selected_item.is_some()
            && !self.stats.is_empty()
            && self.calculated_revision != Some(self.revision)
    }

    pub fn select_item(&mut self, item: ItemSummary) {
        self.stats = item.stats.clone();
        self.selected_item = Some(item);
        self.result = None;
        self.recipe.clear();
        self.coefficient = None;
        self.last_coefficient_date = None;
        self.touch();
    }

    pub fn apply_details(&mut self, details: ItemDetails) {
        self.item_level = details.level;
        self.coefficient = Some(
            details
                .last_coefficient
                .filter(|value| *value != 0.0)
                .unwrap_or(DEFAULT_COEFFICIENT),
        );
        self.last_coefficient_date = details.last_coefficient_date;
        self.stats = prepare_stats(&details.stats);
        self.recipe = details.recipe;
        self.touch();
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = clamp_cost(cost);
        self.touch();
    }

    pub fn set_coefficient(&mut self, coefficient: Option<f64>) {
        self.coefficient = coefficient.map(clamp_coefficient);
        self.touch();
    }

    pub fn set_stat_value(&mut self, index: usize, value: f64) -> bool {
        let changed = set_stat_value(&mut self.stats, index, value);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn set_rune_price(&mut self, rune_name: impl Into<String>, price: f64) {
        let price = clamp_rune_price(price);
        self.rune_prices
            .entry(rune_name.into())
            .and_modify(|entry| entry.price = price)
            .or_insert_with(|| RunePrice::new(price));
        self.touch();
    }

    pub fn set_rune_prices(&mut self, prices: RunePrices) {
        self.rune_prices = prices;
        self.touch();
    }

    /// Records that the current coefficient was saved at `saved_at`. Inputs are
    /// unchanged, so no recalculation is needed.
    pub fn mark_coefficient_saved(&mut self, saved_at: impl Into<String>) {
        self.last_coefficient_date = Some(saved_at.into());
    }

    /// Builds the request for the current revision, or `None` when nothing is selected.
    pub fn calculate_request(&self) -> Option<CalculateRequest> {
        if self.selected_item.is_none() || self.stats.is_empty() {
            return None;
        }

        Some(CalculateRequest {
            item_level: self.item_level,
            stats: self.stats.clone(),
            coefficient: self.coefficient.unwrap_or(0.0),
            item_cost: self.cost,
            rune_prices: plain_rune_prices(&self.rune_prices),
            lang: self.language.code().to_string(),
            server: self.server.clone(),
        })
    }

    /// Stores a server result computed for `revision`. Results for older revisions are dropped.
    pub fn apply_result(&mut self, revision: u64, response: CalculateResponse) -> bool {
        if revision != self.revision {
            log::debug!(
                "[session] Dropping result for revision {revision}, current is {}",
                self.revision
            );
            return false;
        }
        self.result = Some(response);
        self.calculated_revision = Some(revision);
        true
    }

    /// Metrics re-derived from the last result with the current prices and cost.
    pub fn live_metrics(&self) -> LiveMetrics {
        match (&self.selected_item, &self.result) {
            (Some(_), Some(result)) => derive_metrics_from_breakdown(
                &result.breakdown,
                &self.stats,
                &self.rune_prices,
                self.cost,
                result.coefficient,
            ),
            _ => LiveMetrics::default(),
        }
    }

    pub fn set_language(&mut self, language: Language) {
        if self.language != language {
            self.language = language;
            self.reset();
        }
    }

    pub fn set_server(&mut self, server: impl Into<String>) {
        self.server = server.into();
        self.reset();
    }

    fn reset(&mut self) {
        self.selected_item = None;
        self.stats.clear();
        self.recipe.clear();
        self.cost = 0.0;
        self.coefficient = Some(DEFAULT_COEFFICIENT);
        self.last_coefficient_date = None;
        self.item_level = DEFAULT_ITEM_LEVEL;
        self.result = None;
        self.calculated_revision = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RuneBreakdown;

    fn summary() -> ItemSummary {
        ItemSummary {
            id: 42,
            name: "Gelano".to_string(),
            img: String::new(),
            stats: vec![Stat::new("Vitality", 0.0).with_range(41.0, 60.0)],
            level: Some(60),
        }
    }

    fn details() -> ItemDetails {
        ItemDetails {
            id: 42,
            name: "Gelano".to_string(),
            img: String::new(),
            level: 60,
            item_type: Some("Ring".to_string()),
            stats: vec![Stat::new("Vitality", 0.0).with_range(41.0, 60.0)],
            recipe: Vec::new(),
            last_coefficient: None,
            last_coefficient_date: None,
        }
    }

    fn loaded_session() -> CalculatorSession {
        let mut session = CalculatorSession::default();
        session.select_item(summary());
        session.apply_details(details());
        session
    }

    #[test]
    fn details_apply_defaults() {
        let session = loaded_session();
        assert_eq!(session.item_level, 60);
        assert_eq!(session.coefficient, Some(DEFAULT_COEFFICIENT));
        assert_eq!(session.stats[0].value, 50.0);
        assert!(session.needs_calculation());
    }

    #[test]
    fn request_sends_empty_coefficient_as_zero() {
        let mut session = loaded_session();
        session.set_coefficient(None);
        session.set_rune_price("Vi Rune", 3.0);
        let request = session.calculate_request().unwrap();
        assert_eq!(request.coefficient, 0.0);
        assert_eq!(request.rune_prices["Vi Rune"], 3.0);
        assert_eq!(request.lang, "es");
        assert_eq!(request.server, DEFAULT_SERVER);
    }

    #[test]
    fn no_request_without_item() {
        assert!(CalculatorSession::default().calculate_request().is_none());
    }

    #[test]
    fn stale_result_is_dropped() {
        let mut session = loaded_session();
        let requested_at = session.revision();
        session.set_cost(500.0);
        assert!(!session.apply_result(requested_at, CalculateResponse::default()));
        assert!(session.result.is_none());
        assert!(session.apply_result(session.revision(), CalculateResponse::default()));
        assert!(!session.needs_calculation());
    }

    #[test]
    fn price_edit_updates_metrics_without_new_result() {
        let mut session = loaded_session();
        session.set_rune_price("Vi Rune", 2.0);
        let response = CalculateResponse {
            breakdown: vec![RuneBreakdown::new("Vitality", "Vi Rune", 10.0).with_focus(4.0)],
            coefficient: 100.0,
            ..CalculateResponse::default()
        };
        session.apply_result(session.revision(), response);
        assert_eq!(session.live_metrics().total_value, 20.0);

        session.set_rune_price("Vi Rune", 3.0);
        assert_eq!(session.live_metrics().total_value, 30.0);
    }

    #[test]
    fn inputs_are_clamped() {
        let mut session = loaded_session();
        session.set_cost(-5.0);
        session.set_coefficient(Some(9000.0));
        assert_eq!(session.cost, 0.0);
        assert_eq!(session.coefficient, Some(4000.0));
    }

    #[test]
    fn rune_price_edits_are_capped() {
        let mut session = loaded_session();
        session.set_rune_price("Vi Rune", 50_000_000.0);
        assert_eq!(session.rune_prices["Vi Rune"].price, 10_000_000.0);
        session.set_rune_price("Vi Rune", -4.0);
        assert_eq!(session.rune_prices["Vi Rune"].price, 0.0);
    }

    #[test]
    fn saving_coefficient_updates_date_only() {
        let mut session = loaded_session();
        let revision = session.revision();
        session.mark_coefficient_saved("2025-03-07T18:05:09Z");
        assert_eq!(
            session.last_coefficient_date.as_deref(),
            Some("2025-03-07T18:05:09Z")
        );
        assert_eq!(session.revision(), revision);
    }

    #[test]
    fn server_change_resets_calculator() {
        let mut session = loaded_session();
        session.set_cost(1000.0);
        session.set_server("Brial");
        assert!(session.selected_item.is_none());
        assert_eq!(session.cost, 0.0);
        assert_eq!(session.coefficient, Some(DEFAULT_COEFFICIENT));
        assert_eq!(session.item_level, DEFAULT_ITEM_LEVEL);
        assert_eq!(session.live_metrics(), LiveMetrics::default());
    }

    #[test]
    fn same_language_keeps_state() {
        let mut session = loaded_session();
        session.set_language(Language::Es);
        assert!(session.selected_item.is_some());
        session.set_language(Language::Fr);
        assert!(session.selected_item.is_none());
    }
}
