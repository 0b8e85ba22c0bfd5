use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use serde::Deserialize;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::Mutex,
};

use crate::{
    domain::{
        entities::{plain_rune_prices, DEFAULT_SERVER, KNOWN_SERVERS},
        estimator::{
            derive_metrics_from_breakdown, resolve_rune_name, sanitize_numeric_input,
            DEFAULT_COEFFICIENT,
        },
        stats::stat_by_name,
        recipe_cost, CalculatorSession, CoefficientSnapshot, IngredientPriceUpdate, ItemId,
        ItemSummary, Language, LiveMetrics, Profession, ProfitQuery, RuneBreakdown, RunePrice,
        RunePrices, Stat,
    },
    infra::{
        api::{ApiClient, ApiError},
        cache::{age_string, CacheError, CacheStatus, ResourceListCache},
    },
    util::{
        debounce::Debouncer,
        format::{format_date, format_kamas, format_percent, now_timestamp},
        persistence::{save_settings, settings_file, Settings, SettingsError},
    },
};

pub const USAGE: &str = "\
usage: kamaskope [--lang es|en|fr|pt] [--server NAME] <command>

commands:
  search <query>                       find craftable items
  estimate <item-id> [--cost N] [--coefficient N] [--price RUNE=N]...
                                       compute rune yield and profit once
  watch <item-id>                      edit cost, coefficient, stats and prices live
  metrics <file.json>                  derive metrics from a saved breakdown, offline
  prices                               list rune prices
  sync-images                          ask the backend to refresh rune images
  ingredient-price <item-id> <kamas>   set an ingredient price (negative: unavailable)
  resources <profession> [--min N] [--max N] [--refresh]
                                       list ingredients used by a profession
  best <profession> [--min N] [--max N] [--page N] [--min-profit N]
                                       best items to craft for profit
  history <item-id>                    saved coefficients for an item
  config [--write]                     show (or write) the settings file";

const SWITCHES: [&str; 3] = ["refresh", "write", "help"];

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid input file: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AppError {
    pub fn is_usage(&self) -> bool {
        matches!(self, AppError::Usage(_))
    }
}

fn usage(message: impl Into<String>) -> AppError {
    AppError::Usage(message.into())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub cost: Option<f64>,
    pub coefficient: Option<f64>,
    pub prices: Vec<(String, f64)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Help,
    Search(String),
    Estimate(ItemId, Overrides),
    Watch(ItemId),
    Metrics(PathBuf),
    Prices,
    SyncImages,
    IngredientPrice(ItemId, f64),
    Resources {
        profession: Profession,
        min_level: u32,
        max_level: u32,
        refresh: bool,
    },
    Best(Profession, ProfitQuery),
    History(ItemId),
    Config { write: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub language: Option<Language>,
    pub server: String,
    pub command: Command,
}

struct Flags(Vec<(String, Option<String>)>);

impl Flags {
    fn value(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(flag, _)| flag == name)
            .and_then(|(_, value)| value.as_deref())
    }

    fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(flag, _)| flag == name)
            .filter_map(|(_, value)| value.as_deref())
    }

    fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(flag, _)| flag == name)
    }

    fn level(&self, name: &str, default: u32) -> Result<u32, AppError> {
        match self.value(name) {
            Some(raw) => raw
                .parse()
                .map_err(|_| usage(format!("--{name} expects a level, got '{raw}'"))),
            None => Ok(default),
        }
    }

    fn amount(&self, name: &str) -> Result<Option<f64>, AppError> {
        match self.value(name) {
            Some(raw) => sanitize_numeric_input(raw)
                .map(Some)
                .ok_or_else(|| usage(format!("--{name} expects a number, got '{raw}'"))),
            None => Ok(None),
        }
    }
}

pub fn parse_args<I>(args: I) -> Result<Invocation, AppError>
where
    I: IntoIterator<Item = String>,
{
    let mut positional = Vec::new();
    let mut flags = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if let Some(name) = arg.strip_prefix("--") {
            if SWITCHES.contains(&name) {
                flags.push((name.to_string(), None));
            } else {
                let value = iter
                    .next()
                    .ok_or_else(|| usage(format!("--{name} needs a value")))?;
                flags.push((name.to_string(), Some(value)));
            }
        } else {
            positional.push(arg);
        }
    }
    let flags = Flags(flags);

    let language = flags
        .value("lang")
        .map(|code| {
            Language::from_code(code).ok_or_else(|| usage(format!("unknown language '{code}'")))
        })
        .transpose()?;
    let server = flags.value("server").unwrap_or(DEFAULT_SERVER).to_string();

    let command = if flags.has("help") {
        Command::Help
    } else {
        parse_command(&positional, &flags)?
    };

    Ok(Invocation {
        language,
        server,
        command,
    })
}

fn parse_command(positional: &[String], flags: &Flags) -> Result<Command, AppError> {
    let rest = positional.get(1..).unwrap_or_default();
    let command = match positional.first().map(String::as_str) {
        None | Some("help") => Command::Help,
        Some("search") => {
            let query = rest.join(" ");
            if query.trim().is_empty() {
                return Err(usage("search needs a query"));
            }
            Command::Search(query)
        }
        Some("estimate") => Command::Estimate(item_id(rest)?, parse_overrides(flags)?),
        Some("watch") => Command::Watch(item_id(rest)?),
        Some("history") => Command::History(item_id(rest)?),
        Some("metrics") => {
            let path = rest.first().ok_or_else(|| usage("metrics needs a file"))?;
            Command::Metrics(PathBuf::from(path))
        }
        Some("prices") => Command::Prices,
        Some("sync-images") => Command::SyncImages,
        Some("ingredient-price") => {
            let id = item_id(rest)?;
            let raw = rest
                .get(1)
                .ok_or_else(|| usage("ingredient-price needs a price"))?;
            // A leading minus marks the ingredient unavailable on this server.
            let price = match raw.strip_prefix('-') {
                Some(_) => -1.0,
                None => sanitize_numeric_input(raw)
                    .ok_or_else(|| usage(format!("invalid price '{raw}'")))?,
            };
            Command::IngredientPrice(id, price)
        }
        Some("resources") => Command::Resources {
            profession: profession(rest)?,
            min_level: flags.level("min", 10)?,
            max_level: flags.level("max", 60)?,
            refresh: flags.has("refresh"),
        },
        Some("best") => {
            let profession = profession(rest)?;
            let query = ProfitQuery {
                types: profession
                    .item_types()
                    .iter()
                    .map(|kind| kind.to_string())
                    .collect(),
                min_level: flags.level("min", 1)?,
                max_level: flags.level("max", 200)?,
                min_profit: flags.amount("min-profit")?.unwrap_or(0.0),
                page: flags.level("page", 1)?.max(1),
                ..ProfitQuery::default()
            };
            Command::Best(profession, query)
        }
        Some("config") => Command::Config {
            write: flags.has("write"),
        },
        Some(other) => return Err(usage(format!("unknown command '{other}'"))),
    };
    Ok(command)
}

fn item_id(rest: &[String]) -> Result<ItemId, AppError> {
    let raw = rest.first().ok_or_else(|| usage("missing item id"))?;
    raw.parse()
        .map_err(|_| usage(format!("'{raw}' is not an item id")))
}

fn profession(rest: &[String]) -> Result<Profession, AppError> {
    let raw = rest.first().ok_or_else(|| usage("missing profession"))?;
    Profession::from_name(raw).ok_or_else(|| {
        let known: Vec<&str> = Profession::ALL.iter().map(Profession::name).collect();
        usage(format!(
            "unknown profession '{raw}' (one of: {})",
            known.join(", ")
        ))
    })
}

fn parse_overrides(flags: &Flags) -> Result<Overrides, AppError> {
    let prices = flags
        .values("price")
        .map(parse_price_assignment)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Overrides {
        cost: flags.amount("cost")?,
        coefficient: flags.amount("coefficient")?,
        prices,
    })
}

/// `RUNE NAME=PRICE`; rune names may contain spaces.
fn parse_price_assignment(raw: &str) -> Result<(String, f64), AppError> {
    let (name, price) = raw
        .rsplit_once('=')
        .ok_or_else(|| usage(format!("--price expects RUNE=PRICE, got '{raw}'")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(usage(format!("--price expects RUNE=PRICE, got '{raw}'")));
    }
    let price = sanitize_numeric_input(price)
        .ok_or_else(|| usage(format!("invalid price in '{raw}'")))?;
    Ok((name.to_string(), price))
}

pub async fn run(invocation: Invocation, settings: Settings) -> Result<(), AppError> {
    let language = invocation.language.unwrap_or(settings.language);
    if !KNOWN_SERVERS.contains(&invocation.server.as_str()) {
        log::warn!("[app] Unknown server '{}', sending it as-is", invocation.server);
    }

    let mut client = ApiClient::with_base_url(&settings.api_base_url)?
        .with_locale(language, invocation.server.clone());
    match ResourceListCache::in_data_dir(settings.resource_cache_ttl()) {
        Ok(cache) => client = client.with_resource_cache(cache),
        Err(e) => log::warn!("[app] Resource cache disabled: {e}"),
    }

    match invocation.command {
        Command::Help => println!("{USAGE}"),
        Command::Search(query) => search(&client, &query).await?,
        Command::Estimate(id, overrides) => estimate(&client, id, &overrides).await?,
        Command::Watch(id) => watch(&client, id, &settings).await?,
        Command::Metrics(path) => {
            let metrics = metrics_from_file(&path)?;
            print_metrics(&metrics, None);
        }
        Command::Prices => prices(&client).await?,
        Command::SyncImages => {
            client.sync_rune_images().await?;
            println!("Rune image sync started.");
        }
        Command::IngredientPrice(id, price) => {
            let update = IngredientPriceUpdate {
                item_id: id,
                price,
                name: None,
            };
            client.update_ingredient_prices(&[update]).await?;
            println!("Saved price for ingredient {id}.");
        }
        Command::Resources {
            profession,
            min_level,
            max_level,
            refresh,
        } => resources(&client, profession, min_level, max_level, refresh).await?,
        Command::Best(profession, query) => best(&client, profession, &query).await?,
        Command::History(id) => history(&client, id).await?,
        Command::Config { write } => config(&settings, write)?,
    }
    Ok(())
}

async fn search(client: &ApiClient, query: &str) -> Result<(), AppError> {
    let items = client.search_items(query).await?;
    if items.is_empty() {
        println!("No items match '{query}'.");
    }
    for item in items {
        let level = item
            .level
            .map(|level| format!("lvl {level}"))
            .unwrap_or_default();
        println!("{:>8}  {:<40} {}", item.id, item.name, level);
    }
    Ok(())
}

/// Fetches details, prices and recipe cost for `id` into a fresh session.
async fn load_session(client: &ApiClient, id: ItemId) -> Result<CalculatorSession, AppError> {
    let details = match client.get_item_details(id).await {
        Ok(details) => details,
        Err(e) if e.is_not_found() => {
            return Err(usage(format!("item {id} does not exist on the backend")))
        }
        Err(e) => return Err(e.into()),
    };
    let mut session = CalculatorSession::new(client.language(), client.server());
    session.select_item(ItemSummary {
        id: details.id,
        name: details.name.clone(),
        img: details.img.clone(),
        stats: details.stats.clone(),
        level: Some(details.level),
    });
    session.apply_details(details);

    match client.get_rune_prices().await {
        Ok(payload) => {
            if payload.status == CacheStatus::Stale {
                log::warn!("[app] Rune prices may be outdated");
            }
            session.set_rune_prices(payload.data);
        }
        Err(e) => log::warn!("[app] Rune prices unavailable: {e}"),
    }

    match client.get_ingredient_prices().await {
        Ok(prices) => {
            let cost = recipe_cost(&session.recipe, &prices);
            if !cost.is_complete() {
                log::warn!(
                    "[app] {} ingredients have no price; cost is underestimated",
                    cost.missing.len()
                );
            }
            if !cost.is_craftable() {
                log::warn!("[app] Some ingredients are unavailable on {}", client.server());
            }
            session.set_cost(cost.total);
        }
        Err(e) => log::warn!("[app] Ingredient prices unavailable: {e}"),
    }

    Ok(session)
}

fn apply_overrides(session: &mut CalculatorSession, overrides: &Overrides) {
    if let Some(cost) = overrides.cost {
        session.set_cost(cost);
    }
    if let Some(coefficient) = overrides.coefficient {
        session.set_coefficient(Some(coefficient));
    }
    for (rune, price) in &overrides.prices {
        session.set_rune_price(rune.clone(), *price);
    }
}

async fn estimate(client: &ApiClient, id: ItemId, overrides: &Overrides) -> Result<(), AppError> {
    let mut session = load_session(client, id).await?;
    apply_overrides(&mut session, overrides);

    let Some(request) = session.calculate_request() else {
        println!("Item {id} has no stats to destroy.");
        return Ok(());
    };
    let revision = session.revision();
    let response = client.server_compute_breakdown(&request).await?;
    session.apply_result(revision, response);
    print_session(&session);
    Ok(())
}

async fn calculate(client: ApiClient, session: Arc<Mutex<CalculatorSession>>) {
    let (revision, request) = {
        let session = session.lock().await;
        match session.calculate_request() {
            Some(request) => (session.revision(), request),
            None => return,
        }
    };

    match client.server_compute_breakdown(&request).await {
        Ok(response) => {
            let mut session = session.lock().await;
            if session.apply_result(revision, response) {
                print_session(&session);
            }
        }
        // Old figures stay on screen.
        Err(e) => log::error!("[app] Calculation failed: {e}"),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum WatchInput {
    Cost(f64),
    Coefficient(Option<f64>),
    Stat(usize, f64),
    Price(String, f64),
    Show,
    Refresh,
    Save,
    SavePrices,
    Quit,
}

fn parse_watch_line(line: &str) -> Result<WatchInput, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "cost" => sanitize_numeric_input(rest)
            .map(WatchInput::Cost)
            .ok_or_else(|| "usage: cost <kamas>".to_string()),
        "coef" | "coefficient" => Ok(WatchInput::Coefficient(sanitize_numeric_input(rest))),
        "stat" => {
            let (index, value) = rest
                .split_once(' ')
                .ok_or_else(|| "usage: stat <index> <value>".to_string())?;
            let index = index
                .parse()
                .map_err(|_| "usage: stat <index> <value>".to_string())?;
            // Rolls may be negative, so this one is parsed as-is.
            let value = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| "usage: stat <index> <value>".to_string())?;
            Ok(WatchInput::Stat(index, value))
        }
        "price" => {
            let (name, price) = rest
                .rsplit_once(' ')
                .ok_or_else(|| "usage: price <rune name> <kamas>".to_string())?;
            let price = sanitize_numeric_input(price)
                .ok_or_else(|| "usage: price <rune name> <kamas>".to_string())?;
            Ok(WatchInput::Price(name.trim().to_string(), price))
        }
        "show" | "" => Ok(WatchInput::Show),
        "refresh" => Ok(WatchInput::Refresh),
        "save" => Ok(WatchInput::Save),
        "save-prices" => Ok(WatchInput::SavePrices),
        "quit" | "exit" => Ok(WatchInput::Quit),
        other => Err(format!("unknown input '{other}'")),
    }
}

async fn watch(client: &ApiClient, id: ItemId, settings: &Settings) -> Result<(), AppError> {
    let session = Arc::new(Mutex::new(load_session(client, id).await?));
    let mut debouncer = Debouncer::new(settings.calculate_debounce());
    debouncer.schedule(calculate(client.clone(), session.clone()));

    println!(
        "cost N | coef N | stat I V | price RUNE N | show | refresh | save | save-prices | quit"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match parse_watch_line(&line) {
            Ok(input) => input,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let mut state = session.lock().await;
        match input {
            WatchInput::Quit => break,
            WatchInput::Show => {
                print_stats(&state.stats);
                print_session(&state);
                if state.needs_calculation() || debouncer.is_pending() {
                    println!("(recalculating)");
                }
                continue;
            }
            WatchInput::Refresh => {
                drop(state);
                client.clear_cache().await;
                match client.get_rune_prices().await {
                    Ok(payload) => session.lock().await.set_rune_prices(payload.data),
                    Err(e) => {
                        log::error!("[app] Failed to refresh rune prices: {e}");
                        continue;
                    }
                }
            }
            WatchInput::Save => {
                let metrics = state.live_metrics();
                let Some(coefficient) = state.coefficient else {
                    println!("Set a coefficient first.");
                    continue;
                };
                let snapshot = CoefficientSnapshot {
                    coefficient,
                    item_cost: state.cost,
                    total_value: metrics.total_value,
                    profit: metrics.profit,
                };
                drop(state);
                match client.save_item_coefficient(id, &snapshot).await {
                    Ok(()) => {
                        session.lock().await.mark_coefficient_saved(now_timestamp());
                        println!("Saved coefficient {}.", format_percent(coefficient));
                    }
                    Err(e) => log::error!("[app] Failed to save coefficient: {e}"),
                }
                continue;
            }
            WatchInput::SavePrices => {
                let prices = plain_rune_prices(&state.rune_prices);
                drop(state);
                if let Err(e) = client.update_rune_prices(&prices).await {
                    log::error!("[app] Failed to save rune prices: {e}");
                }
                continue;
            }
            WatchInput::Cost(cost) => state.set_cost(cost),
            WatchInput::Coefficient(coefficient) => state.set_coefficient(coefficient),
            WatchInput::Stat(index, value) => {
                if !state.set_stat_value(index, value) {
                    println!("No stat at index {index}.");
                    continue;
                }
            }
            WatchInput::Price(rune, price) => {
                state.set_rune_price(rune, price);
                // Re-priced locally right away; the server pass below confirms it.
                print_metrics(&state.live_metrics(), state.coefficient);
            }
        }
        debouncer.schedule(calculate(client.clone(), session.clone()));
    }

    debouncer.cancel();
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MetricsInput {
    breakdown: Vec<RuneBreakdown>,
    #[serde(default)]
    stats: Vec<Stat>,
    #[serde(default)]
    rune_prices: HashMap<String, f64>,
    #[serde(default)]
    cost: f64,
    #[serde(default = "default_coefficient")]
    coefficient: f64,
}

fn default_coefficient() -> f64 {
    DEFAULT_COEFFICIENT
}

fn metrics_from_input(input: &MetricsInput) -> LiveMetrics {
    let prices: RunePrices = input
        .rune_prices
        .iter()
        .map(|(name, price)| (name.clone(), RunePrice::new(*price)))
        .collect();
    derive_metrics_from_breakdown(
        &input.breakdown,
        &input.stats,
        &prices,
        input.cost,
        input.coefficient,
    )
}

fn metrics_from_file(path: &Path) -> Result<LiveMetrics, AppError> {
    let raw = fs::read_to_string(path)?;
    let input: MetricsInput = serde_json::from_str(&raw)?;
    Ok(metrics_from_input(&input))
}

async fn prices(client: &ApiClient) -> Result<(), AppError> {
    let payload = client.get_rune_prices().await?;
    let age = SystemTime::now()
        .duration_since(payload.fetched_at)
        .unwrap_or_default();
    println!(
        "{} rune prices for {} ({:?}, fetched {} ago)",
        payload.data.len(),
        client.server(),
        payload.status,
        age_string(age.as_secs())
    );
    let mut names: Vec<&String> = payload.data.keys().collect();
    names.sort();
    for name in names {
        let entry = &payload.data[name];
        println!(
            "{:<32} {:>12}  {}",
            name,
            format_kamas(entry.price),
            format_date(entry.updated_at.as_deref())
        );
    }
    Ok(())
}

async fn resources(
    client: &ApiClient,
    profession: Profession,
    min_level: u32,
    max_level: u32,
    refresh: bool,
) -> Result<(), AppError> {
    let ingredients = client
        .ingredients_by_filter(profession, min_level, max_level, refresh)
        .await?;
    let prices = match client.get_ingredient_prices().await {
        Ok(prices) => prices,
        Err(e) => {
            log::warn!("[app] Ingredient prices unavailable: {e}");
            Default::default()
        }
    };
    for ingredient in ingredients {
        let price = prices
            .get(&ingredient.id)
            .map(|entry| format_kamas(entry.price))
            .unwrap_or_else(|| "-".to_string());
        println!("{:>8}  {:<40} {:>12}", ingredient.id, ingredient.name, price);
    }
    Ok(())
}

async fn best(client: &ApiClient, profession: Profession, query: &ProfitQuery) -> Result<(), AppError> {
    let page = client.best_profit_items(query).await?;
    println!(
        "{} items for {} (page {}/{})",
        page.total,
        profession.name(),
        page.page,
        page.total_pages.max(1)
    );
    for item in page.items {
        let last = item
            .last_coefficient
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} lvl {:>3}  min {:>9}  last {:>9}  cost {:>10} k  value {:>10} k",
            item.name,
            item.level,
            format_percent(item.min_coefficient),
            last,
            format_kamas(item.craft_cost),
            format_kamas(item.estimated_rune_value)
        );
    }
    Ok(())
}

async fn history(client: &ApiClient, id: ItemId) -> Result<(), AppError> {
    let records = client.coefficient_history(id).await?;
    if records.is_empty() {
        println!("No saved coefficients for item {id}.");
    }
    for record in records {
        println!(
            "{}  {:>9}",
            format_date(Some(record.date.as_str())),
            format_percent(record.coefficient)
        );
    }
    Ok(())
}

fn config(settings: &Settings, write: bool) -> Result<(), AppError> {
    if write {
        let path = save_settings(settings)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    match settings_file() {
        Some(path) => println!("settings file: {}", path.display()),
        None => println!("settings file: unavailable"),
    }
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

fn print_stats(stats: &[Stat]) {
    for (index, stat) in stats.iter().enumerate() {
        println!(
            "[{index}] {:<28} {:>6} ({} to {})",
            stat.name, stat.value, stat.min, stat.max
        );
    }
}

fn print_session(session: &CalculatorSession) {
    if let Some(item) = &session.selected_item {
        println!("{} (lvl {})", item.name, session.item_level);
    }
    if session.last_coefficient_date.is_some() {
        println!(
            "last saved coefficient: {}",
            format_date(session.last_coefficient_date.as_deref())
        );
    }
    if let Some(result) = &session.result {
        for entry in &result.breakdown {
            let (rune_name, price) = entry_price(entry, &session.stats, &session.rune_prices);
            println!(
                "  {:<28} {:<24} x{:>8.2}  focus x{:>8.2}  @ {}",
                entry.stat,
                rune_name,
                entry.count,
                entry.focus_count.unwrap_or(0.0),
                format_kamas(price)
            );
        }
        if let Some(stat) = &result.best_focus_stat {
            println!("  best focus: {stat}");
        }
    }
    print_metrics(&session.live_metrics(), session.coefficient);
}

/// Rune name and unit price an entry is valued with, matching the totals.
fn entry_price<'a>(
    entry: &'a RuneBreakdown,
    stats: &'a [Stat],
    prices: &RunePrices,
) -> (&'a str, f64) {
    let rune_name = resolve_rune_name(entry, stat_by_name(stats, &entry.stat));
    let price = prices.get(rune_name).map(|price| price.price).unwrap_or(0.0);
    (rune_name, price)
}

fn print_metrics(metrics: &LiveMetrics, coefficient: Option<f64>) {
    let best = if metrics.focus_wins() { "focus" } else { "spread" };
    println!(
        "value {} k via {best} (spread {} k, focus {} k)",
        format_kamas(metrics.total_value),
        format_kamas(metrics.without_focus_total),
        format_kamas(metrics.focus_total)
    );
    let sign = if metrics.is_profitable() { "+" } else { "" };
    println!("profit {sign}{} k", format_kamas(metrics.profit));
    let verdict = match coefficient {
        Some(coefficient) if metrics.break_even_coefficient > 0.0 => {
            if metrics.covers(coefficient) {
                " (reached)"
            } else {
                " (not reached)"
            }
        }
        _ => "",
    };
    println!(
        "break-even coefficient {}{verdict}",
        format_percent(metrics.break_even_coefficient)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn estimate_collects_overrides() {
        let invocation = parse_args(args(&[
            "--server",
            "Brial",
            "estimate",
            "2469",
            "--cost",
            "15000",
            "--coefficient",
            "-230",
            "--price",
            "Runa Ga PA=3500",
            "--price",
            "Runa Vi=4",
        ]))
        .unwrap();
        assert_eq!(invocation.server, "Brial");
        assert_eq!(invocation.language, None);
        let Command::Estimate(id, overrides) = invocation.command else {
            panic!("expected estimate");
        };
        assert_eq!(id, 2469);
        assert_eq!(overrides.cost, Some(15000.0));
        assert_eq!(overrides.coefficient, Some(230.0));
        assert_eq!(
            overrides.prices,
            vec![
                ("Runa Ga PA".to_string(), 3500.0),
                ("Runa Vi".to_string(), 4.0)
            ]
        );
    }

    #[test]
    fn search_joins_words() {
        let invocation = parse_args(args(&["--lang", "fr", "search", "anneau", "du", "bouftou"]))
            .unwrap();
        assert_eq!(invocation.language, Some(Language::Fr));
        assert_eq!(
            invocation.command,
            Command::Search("anneau du bouftou".to_string())
        );
        assert_eq!(invocation.server, DEFAULT_SERVER);
    }

    #[test]
    fn resources_defaults_levels() {
        let invocation = parse_args(args(&["resources", "tailor", "--refresh"])).unwrap();
        assert_eq!(
            invocation.command,
            Command::Resources {
                profession: Profession::Tailor,
                min_level: 10,
                max_level: 60,
                refresh: true,
            }
        );
    }

    #[test]
    fn best_uses_profession_types() {
        let invocation = parse_args(args(&["best", "jeweller", "--max", "120"])).unwrap();
        let Command::Best(profession, query) = invocation.command else {
            panic!("expected best");
        };
        assert_eq!(profession, Profession::Jeweller);
        assert_eq!(query.types, vec!["Amulet".to_string(), "Ring".to_string()]);
        assert_eq!(query.max_level, 120);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn bad_input_is_a_usage_error() {
        assert!(parse_args(args(&["estimate", "abc"])).unwrap_err().is_usage());
        assert!(parse_args(args(&["frobnicate"])).unwrap_err().is_usage());
        assert!(parse_args(args(&["--lang", "de", "prices"])).unwrap_err().is_usage());
        assert!(parse_args(args(&["estimate", "1", "--cost"])).unwrap_err().is_usage());
        assert!(parse_args(args(&["estimate", "1", "--price", "=4"]))
            .unwrap_err()
            .is_usage());
    }

    #[test]
    fn ingredient_price_marks_unavailable() {
        let invocation = parse_args(args(&["ingredient-price", "421", "1500"])).unwrap();
        assert_eq!(invocation.command, Command::IngredientPrice(421, 1500.0));
        let invocation = parse_args(args(&["ingredient-price", "421", "-1"])).unwrap();
        assert_eq!(invocation.command, Command::IngredientPrice(421, -1.0));
        assert!(parse_args(args(&["ingredient-price", "421"]))
            .unwrap_err()
            .is_usage());
    }

    #[test]
    fn no_arguments_prints_help() {
        assert_eq!(parse_args(Vec::new()).unwrap().command, Command::Help);
    }

    #[test]
    fn watch_lines_parse() {
        assert_eq!(parse_watch_line("cost 1500"), Ok(WatchInput::Cost(1500.0)));
        assert_eq!(parse_watch_line("coef "), Ok(WatchInput::Coefficient(None)));
        assert_eq!(parse_watch_line("stat 2 -15"), Ok(WatchInput::Stat(2, -15.0)));
        assert_eq!(
            parse_watch_line("price Runa Ga PA 3500"),
            Ok(WatchInput::Price("Runa Ga PA".to_string(), 3500.0))
        );
        assert_eq!(parse_watch_line(""), Ok(WatchInput::Show));
        assert!(parse_watch_line("stat 0 NaN").is_err());
        assert!(parse_watch_line("stat 0 inf").is_err());
        assert!(parse_watch_line("stat 0 -infinity").is_err());
        assert!(parse_watch_line("stat x 1").is_err());
        assert!(parse_watch_line("dance").is_err());
    }

    #[test]
    fn metrics_file_is_read_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "kamaskope-test-metrics-{}.json",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"{"breakdown": [{"stat": "Vitality", "rune_name": "Pet Rune", "count": 10}],
                "rune_prices": {"Pet Rune": 5}, "cost": 20, "coefficient": 100}"#,
        )
        .unwrap();
        let metrics = metrics_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(metrics.total_value, 50.0);
        assert_eq!(metrics.profit, 30.0);
        assert!(metrics_from_file(&path).is_err());
    }

    #[test]
    fn entry_price_uses_stat_rune_fallback() {
        let entry = RuneBreakdown::new("Range", "", 2.0);
        let stats = vec![Stat::new("Range", 1.0).with_rune("Po Rune")];
        let mut prices = RunePrices::new();
        prices.insert("Po Rune".to_string(), RunePrice::new(7.0));
        assert_eq!(entry_price(&entry, &stats, &prices), ("Po Rune", 7.0));
    }

    #[test]
    fn metrics_file_defaults_coefficient() {
        let input: MetricsInput = serde_json::from_str(
            r#"{
                "breakdown": [{"stat": "Vitality", "rune_name": "Pet Rune", "count": 10, "focus_count": 20}],
                "stats": [{"name": "Vitality", "value": 50}],
                "rune_prices": {"Pet Rune": 5},
                "cost": 150
            }"#,
        )
        .unwrap();
        let metrics = metrics_from_input(&input);
        assert_eq!(metrics.total_value, 100.0);
        assert_eq!(metrics.profit, -50.0);
        assert!((metrics.break_even_coefficient - 150.0).abs() < 1e-9);
    }
}
