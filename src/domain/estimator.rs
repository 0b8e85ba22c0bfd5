//! Live profit figures derived from a server-computed rune breakdown.
//!
//! The backend owns the authoritative rune counts for a given set of rolls and
//! coefficient. Everything here only re-prices that breakdown locally, so a
//! price edit updates totals without another round trip.

use super::entities::{rune_price, RuneBreakdown, RunePrices, Stat};
use super::stats::stat_by_name;

/// Upper bound accepted for the coefficient input, in percent.
pub const COEFFICIENT_MAX: f64 = 4000.0;
/// Upper bound accepted for the crafting cost input, in kamas.
pub const COST_MAX: f64 = 10_000_000.0;
/// Upper bound accepted for a single rune price, in kamas.
pub const RUNE_PRICE_MAX: f64 = 10_000_000.0;
/// Coefficient assumed when an item has no saved one.
pub const DEFAULT_COEFFICIENT: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LiveMetrics {
    /// Best of the spread and focused totals, in kamas.
    pub total_value: f64,
    pub without_focus_total: f64,
    pub focus_total: f64,
    pub profit: f64,
    /// Minimum coefficient (percent) at which runes pay back the cost. Zero when unknown.
    pub break_even_coefficient: f64,
}

impl LiveMetrics {
    pub fn is_profitable(&self) -> bool {
        self.profit > 0.0
    }

    /// Whether the given coefficient reaches break-even.
    pub fn covers(&self, coefficient: f64) -> bool {
        self.break_even_coefficient <= coefficient
    }

    pub fn focus_wins(&self) -> bool {
        self.focus_total > self.without_focus_total
    }
}

/// A breakdown entry that survived malus filtering, with its unit price resolved.
#[derive(Clone, Copy, Debug)]
struct PricedYield {
    count: f64,
    focus_count: f64,
    price: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct RuneTotals {
    without_focus: f64,
    max_focus: f64,
}

impl RuneTotals {
    fn best(&self) -> f64 {
        self.without_focus.max(self.max_focus)
    }
}

/// Re-prices `breakdown` with `rune_prices` and derives profit and break-even figures.
///
/// `result_coefficient` is the coefficient (percent) the breakdown was computed
/// with. Entries whose stat rolled negative are skipped entirely. The focused
/// yield is priced with the same rune as the spread yield.
pub fn derive_metrics_from_breakdown(
    breakdown: &[RuneBreakdown],
    stats: &[Stat],
    rune_prices: &RunePrices,
    cost: f64,
    result_coefficient: f64,
) -> LiveMetrics {
    if breakdown.is_empty() {
        return LiveMetrics::default();
    }

    let yields = priced_yields(breakdown, stats, rune_prices);

    // In-game drops are discrete, so each entry is floored before summing.
    let floored = totals(&yields, f64::floor);
    let total_value = floored.best();

    let best_raw = totals(&yields, |value| value).best();

    LiveMetrics {
        total_value,
        without_focus_total: floored.without_focus,
        focus_total: floored.max_focus,
        profit: total_value - cost,
        break_even_coefficient: break_even_coefficient(best_raw, cost, result_coefficient),
    }
}

/// Coefficient (percent) at which `best_total_raw`, scaled back to 100%, equals `cost`.
pub fn break_even_coefficient(best_total_raw: f64, cost: f64, result_coefficient: f64) -> f64 {
    let factor = result_coefficient / 100.0;
    if !(factor > 0.0) {
        return 0.0;
    }

    let value_at_100 = best_total_raw / factor;
    if value_at_100 > 0.0 {
        (cost / value_at_100) * 100.0
    } else {
        0.0
    }
}

fn priced_yields(
    breakdown: &[RuneBreakdown],
    stats: &[Stat],
    rune_prices: &RunePrices,
) -> Vec<PricedYield> {
    breakdown
        .iter()
        .filter_map(|entry| {
            let stat = stat_by_name(stats, &entry.stat);
            if stat.is_some_and(Stat::is_malus) {
                return None;
            }

            let rune_name = resolve_rune_name(entry, stat);

            Some(PricedYield {
                count: entry.count,
                focus_count: entry.focus_count.unwrap_or(0.0),
                price: rune_price(rune_prices, rune_name),
            })
        })
        .collect()
}

/// Rune an entry is priced with: its own `rune_name`, else the stat's, else "".
pub fn resolve_rune_name<'a>(entry: &'a RuneBreakdown, stat: Option<&'a Stat>) -> &'a str {
    non_empty(&entry.rune_name)
        .or_else(|| stat.and_then(|s| s.rune_name.as_deref()).and_then(non_empty))
        .unwrap_or_default()
}

fn totals(yields: &[PricedYield], round: impl Fn(f64) -> f64) -> RuneTotals {
    yields.iter().fold(RuneTotals::default(), |acc, item| {
        let focus = round(item.focus_count * item.price);
        RuneTotals {
            without_focus: acc.without_focus + round(item.count * item.price),
            max_focus: if focus > acc.max_focus { focus } else { acc.max_focus },
        }
    })
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn clamp_coefficient(value: f64) -> f64 {
    clamp_input(value, COEFFICIENT_MAX)
}

pub fn clamp_cost(value: f64) -> f64 {
    clamp_input(value, COST_MAX)
}

pub fn clamp_rune_price(value: f64) -> f64 {
    clamp_input(value, RUNE_PRICE_MAX)
}

fn clamp_input(value: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, max)
    } else {
        0.0
    }
}

/// Parses a numeric text field, dropping anything that is not a digit or the
/// first decimal point. Sign and exponent characters are discarded, so the
/// result is never negative. An empty field yields `None`.
pub fn sanitize_numeric_input(raw: &str) -> Option<f64> {
    let mut cleaned = String::with_capacity(raw.len());
    let mut seen_point = false;
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            cleaned.push(ch);
        } else if ch == '.' && !seen_point {
            seen_point = true;
            cleaned.push(ch);
        }
    }

    if cleaned.is_empty() || cleaned == "." {
        return None;
    }
    cleaned.parse::<f64>().ok()
}
