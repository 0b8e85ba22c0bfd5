//! Thin asynchronous client for the Kamaskope backend.
//!
//! - Typed accessors for item search, details, price maps and the calculate endpoint.
//! - Rune prices and item details sit in TTL caches with stale fallbacks.
//! - Every request carries the active language and server as query parameters.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{
    CalculateRequest, CalculateResponse, CoefficientRecord, CoefficientSnapshot, Ingredient,
    IngredientPriceUpdate, IngredientPrices, ItemDetails, ItemId, ItemSummary, Language,
    Profession, ProfitPage, ProfitQuery, RunePrices,
};
use crate::infra::cache::{CachedPayload, Clock, ResourceListCache, SystemClock, TtlCache};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("kamaskope/", env!("CARGO_PKG_VERSION"));
const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Api { status: 404, .. })
    }
}

type Locale = (Language, String);

struct ApiCache {
    rune_prices: TtlCache<Locale, RunePrices>,
    item_details: TtlCache<(Locale, ItemId), ItemDetails>,
}

impl ApiCache {
    fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            rune_prices: TtlCache::with_clock(ttl, clock.clone()),
            item_details: TtlCache::with_clock(ttl, clock),
        }
    }

    fn clear(&mut self) {
        self.rune_prices.clear();
        self.item_details.clear();
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunePriceUpdateBody<'a> {
    prices: &'a HashMap<String, f64>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    language: Language,
    server: String,
    cache: Arc<Mutex<ApiCache>>,
    resources: Option<Arc<ResourceListCache>>,
}

impl ApiClient {
    pub fn with_base_url(base: &str) -> Result<Self, ApiError> {
        Self::with_clock(base, DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn with_clock(base: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, ApiError> {
        let base_url = parse_base_url(base)?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            language: Language::default(),
            server: crate::domain::entities::DEFAULT_SERVER.to_string(),
            cache: Arc::new(Mutex::new(ApiCache::new(ttl, clock))),
            resources: None,
        })
    }

    /// Same client (and shared caches) scoped to another language and server.
    pub fn with_locale(&self, language: Language, server: impl Into<String>) -> Self {
        Self {
            language,
            server: server.into(),
            ..self.clone()
        }
    }

    pub fn with_resource_cache(mut self, cache: ResourceListCache) -> Self {
        self.resources = Some(Arc::new(cache));
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    /// Items whose name matches `query`. Queries shorter than two characters return nothing.
    pub async fn search_items(&self, query: &str) -> Result<Vec<ItemSummary>, ApiError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let url = self.endpoint("api/items/search", &[("query", query.to_string())])?;
        let items: Vec<ItemSummary> = self.fetch(self.http.get(url)).await?;
        log::debug!("[api] Search '{query}' returned {} items", items.len());
        Ok(items)
    }

    pub async fn get_item_details(&self, id: ItemId) -> Result<ItemDetails, ApiError> {
        let key = (self.locale(), id);
        if let Some(hit) = self.cache.lock().await.item_details.get(&key) {
            log::debug!("[api] Serving cached details for item {id}");
            return Ok(hit.data);
        }

        let url = self.endpoint(&format!("api/items/{id}"), &[])?;
        let details: ItemDetails = self.fetch(self.http.get(url)).await?;
        self.cache
            .lock()
            .await
            .item_details
            .insert(key, details.clone());
        Ok(details)
    }

    /// Authoritative per-stat rune counts for the given rolls and coefficient.
    pub async fn server_compute_breakdown(
        &self,
        request: &CalculateRequest,
    ) -> Result<CalculateResponse, ApiError> {
        let url = self.endpoint("api/calculate", &[])?;
        let response: CalculateResponse = self.fetch(self.http.post(url).json(request)).await?;
        log::debug!(
            "[api] Calculated {} breakdown entries at {}%",
            response.breakdown.len(),
            response.coefficient
        );
        Ok(response)
    }

    pub async fn get_rune_prices(&self) -> Result<CachedPayload<RunePrices>, ApiError> {
        let key = self.locale();
        if let Some(hit) = self.cache.lock().await.rune_prices.get(&key) {
            return Ok(hit);
        }

        let url = self.endpoint("api/prices/runes", &[])?;
        match self.fetch::<RunePrices>(self.http.get(url)).await {
            Ok(prices) => {
                log::info!(
                    "[api] Loaded {} rune prices for {}/{}",
                    prices.len(),
                    self.language.code(),
                    self.server
                );
                Ok(self.cache.lock().await.rune_prices.insert(key, prices))
            }
            Err(error) => {
                if let Some(stale) = self.cache.lock().await.rune_prices.get_stale(&key) {
                    log::warn!("[api] Rune price refresh failed, serving stale copy: {error}");
                    return Ok(stale);
                }
                Err(error)
            }
        }
    }

    pub async fn update_rune_prices(&self, prices: &HashMap<String, f64>) -> Result<(), ApiError> {
        let url = self.endpoint("api/prices/runes", &[])?;
        self.send(self.http.post(url).json(&RunePriceUpdateBody { prices }))
            .await?;
        self.cache.lock().await.rune_prices.invalidate(&self.locale());
        log::info!("[api] Saved {} rune prices", prices.len());
        Ok(())
    }

    /// Asks the backend to refresh rune images in the background.
    pub async fn sync_rune_images(&self) -> Result<(), ApiError> {
        let url = self.endpoint("api/prices/runes/sync-images", &[])?;
        self.send(self.http.post(url)).await?;
        self.cache.lock().await.rune_prices.invalidate(&self.locale());
        Ok(())
    }

    pub async fn get_ingredient_prices(&self) -> Result<IngredientPrices, ApiError> {
        let url = self.endpoint("api/prices/ingredients", &[])?;
        self.fetch(self.http.get(url)).await
    }

    pub async fn update_ingredient_prices(
        &self,
        updates: &[IngredientPriceUpdate],
    ) -> Result<(), ApiError> {
        let url = self.endpoint("api/prices/ingredients", &[])?;
        self.send(self.http.post(url).json(updates)).await?;
        log::info!("[api] Saved {} ingredient prices", updates.len());
        Ok(())
    }

    pub async fn save_item_coefficient(
        &self,
        id: ItemId,
        snapshot: &CoefficientSnapshot,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/items/{id}/coefficient"), &[])?;
        self.send(self.http.post(url).json(snapshot)).await?;
        // Details carry the last saved coefficient.
        self.cache
            .lock()
            .await
            .item_details
            .invalidate(&(self.locale(), id));
        Ok(())
    }

    pub async fn coefficient_history(&self, id: ItemId) -> Result<Vec<CoefficientRecord>, ApiError> {
        let url = self.endpoint(&format!("api/items/{id}/history"), &[])?;
        self.fetch(self.http.get(url)).await
    }

    /// Ingredients used by a profession's recipes in a level range, read
    /// through the resource listing cache unless `force_refresh` is set.
    pub async fn ingredients_by_filter(
        &self,
        profession: Profession,
        min_level: u32,
        max_level: u32,
        force_refresh: bool,
    ) -> Result<Vec<Ingredient>, ApiError> {
        let key = ResourceListCache::key(profession, min_level, max_level);
        if !force_refresh {
            if let Some(data) = self.resources.as_ref().and_then(|cache| cache.load(&key)) {
                return Ok(data);
            }
        }

        let url = self.endpoint(
            "api/items/ingredients/filter",
            &[
                ("types", profession.item_types().join(",")),
                ("min_level", min_level.to_string()),
                ("max_level", max_level.to_string()),
            ],
        )?;
        let data: Vec<Ingredient> = self.fetch(self.http.get(url)).await?;

        if let Some(cache) = self.resources.as_ref() {
            if let Err(e) = cache.save(&key, &data) {
                log::warn!("[api] Failed to cache resource listing {key}: {e}");
            }
        }
        Ok(data)
    }

    pub async fn best_profit_items(&self, query: &ProfitQuery) -> Result<ProfitPage, ApiError> {
        let url = self.endpoint("api/items/profit/best", &profit_params(query))?;
        self.fetch(self.http.get(url)).await
    }

    async fn fetch<T>(&self, builder: reqwest::RequestBuilder) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        log::warn!("[api] Request failed ({status}): {message}");
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, url::ParseError> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs
                .append_pair("lang", self.language.code())
                .append_pair("server", &self.server);
        }
        Ok(url)
    }

    fn locale(&self) -> Locale {
        (self.language, self.server.clone())
    }
}

/// Base URLs need a trailing slash or `join` drops their last segment.
fn parse_base_url(base: &str) -> Result<Url, url::ParseError> {
    if base.ends_with('/') {
        Url::parse(base)
    } else {
        Url::parse(&format!("{base}/"))
    }
}

fn profit_params(query: &ProfitQuery) -> Vec<(&'static str, String)> {
    vec![
        ("types", query.types.join(",")),
        ("min_level", query.min_level.to_string()),
        ("max_level", query.max_level.to_string()),
        ("min_profit", query.min_profit.to_string()),
        ("min_craft_cost", query.min_craft_cost.to_string()),
        ("page", query.page.to_string()),
        ("limit", query.limit.to_string()),
        ("sort_by", query.sort_by.clone()),
        ("sort_order", query.sort_order.clone()),
    ]
}

fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let detail = parsed.and_then(|body| {
        body.message.or_else(|| {
            body.detail.map(|detail| match detail {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            })
        })
    });

    detail
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}
