#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the ride-platform telemetry API and the saved-plan
//! revenue endpoint.
//!
//! The telemetry service answers 404 for cities it has never seen a ride
//! from. That is expected ("no data"), never an error, and is surfaced as
//! `None`/empty rather than logged. Transport failures and 5xx responses
//! are real errors and propagate as [`RidesError`].
//!
//! The city list is cached in memory for 30 seconds to bound request
//! volume; every dashboard card asks for it.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use urban_passageiro_city_models::MonthKey;
use urban_passageiro_rides_models::{
    CitiesResponse, CityRideStats, DailyRides, DailyRidesResponse, MonthlyRides,
    MonthlyRidesResponse, PlanningRevenueResponse, RidesStatus, RidesSummary,
};

/// How long the `/rides/cities` response is reused before refetching.
const CITIES_CACHE_TTL: Duration = Duration::from_secs(30);

/// Errors from the rides-telemetry client.
#[derive(Debug, Error)]
pub enum RidesError {
    /// HTTP request failed (transport, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status other than 404.
    #[error("Rides API returned HTTP {status} for {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The configured base URL is not a valid URL.
    #[error("Invalid rides API base URL: {message}")]
    InvalidBaseUrl {
        /// Description of what went wrong.
        message: String,
    },
}

/// An optional date-range filter forwarded as query parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange<'a> {
    /// Inclusive range start, `YYYY-MM-DD`.
    pub start_date: Option<&'a str>,
    /// Inclusive range end, `YYYY-MM-DD`.
    pub end_date: Option<&'a str>,
}

/// Read-only view of the rides data the projection aggregator needs.
///
/// [`RidesClient`] is the production implementation; tests substitute
/// in-memory fixtures.
#[async_trait]
pub trait RidesProvider: Send + Sync {
    /// Monthly telemetry for a city, up to `months` months.
    ///
    /// An unknown city yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    async fn city_monthly(&self, city: &str, months: u32) -> Result<Vec<MonthlyRides>, RidesError>;

    /// Projected revenue by month from the city's saved plan.
    ///
    /// Empty when no plan was saved.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    async fn planning_revenue(&self, city: &str) -> Result<BTreeMap<MonthKey, f64>, RidesError>;
}

struct CitiesCache {
    fetched_at: Instant,
    cities: Vec<String>,
}

impl CitiesCache {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.fetched_at) < ttl
    }
}

/// Client for the rides-telemetry and planning-revenue HTTP services.
pub struct RidesClient {
    client: reqwest::Client,
    base_url: reqwest::Url,
    cities_cache: Mutex<Option<CitiesCache>>,
}

impl RidesClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self, RidesError> {
        let base_url =
            reqwest::Url::parse(base_url).map_err(|e| RidesError::InvalidBaseUrl {
                message: format!("{base_url}: {e}"),
            })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            cities_cache: Mutex::new(None),
        })
    }

    /// Builds a URL from path segments, percent-encoding each segment.
    /// City names carry spaces and accents ("Barra do Garças").
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, RidesError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| RidesError::InvalidBaseUrl {
                    message: "base URL cannot have path segments".to_string(),
                })?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
        query: &[(&str, String)],
    ) -> Result<Option<T>, RidesError> {
        let response = self.client.get(url.clone()).query(query).send().await?;
        let status = response.status();

        // 404 means "no data for this city", not an error
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RidesError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(Some(response.json().await?))
    }

    /// `GET /rides/status`
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    pub async fn status(&self) -> Result<RidesStatus, RidesError> {
        let url = self.url(&["rides", "status"])?;
        Ok(self
            .get_json(url, &[])
            .await?
            .unwrap_or_else(|| RidesStatus {
                available: false,
                message: "no data".to_string(),
            }))
    }

    /// `GET /rides/cities`, cached for 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    pub async fn cities(&self) -> Result<Vec<String>, RidesError> {
        let now = Instant::now();
        {
            let cache = self
                .cities_cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(cached) = cache.as_ref()
                && cached.is_fresh(now, CITIES_CACHE_TTL)
            {
                return Ok(cached.cities.clone());
            }
        }

        let url = self.url(&["rides", "cities"])?;
        let cities = self
            .get_json::<CitiesResponse>(url, &[])
            .await?
            .map(|r| r.cities)
            .unwrap_or_default();

        log::debug!("Refreshed rides city list cache: {} cities", cities.len());
        let mut cache = self
            .cities_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *cache = Some(CitiesCache {
            fetched_at: now,
            cities: cities.clone(),
        });
        Ok(cities)
    }

    /// `GET /rides/city/:name/stats`; `None` when the city has no data.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    pub async fn city_stats(
        &self,
        city: &str,
        range: DateRange<'_>,
    ) -> Result<Option<CityRideStats>, RidesError> {
        let url = self.url(&["rides", "city", city, "stats"])?;
        let mut query = Vec::new();
        if let Some(start) = range.start_date {
            query.push(("startDate", start.to_string()));
        }
        if let Some(end) = range.end_date {
            query.push(("endDate", end.to_string()));
        }
        self.get_json(url, &query).await
    }

    /// `GET /rides/city/:name/daily`; empty when the city has no data.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    pub async fn city_daily(&self, city: &str, days: u32) -> Result<Vec<DailyRides>, RidesError> {
        let url = self.url(&["rides", "city", city, "daily"])?;
        Ok(self
            .get_json::<DailyRidesResponse>(url, &[("days", days.to_string())])
            .await?
            .map(|r| r.data)
            .unwrap_or_default())
    }

    /// `GET /rides/city/:name/monthly` with explicit pagination; empty
    /// when the city has no data. Pages are 1-based.
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    pub async fn city_monthly_page(
        &self,
        city: &str,
        months: u32,
        page: u32,
        start_date: Option<&str>,
    ) -> Result<Vec<MonthlyRides>, RidesError> {
        let url = self.url(&["rides", "city", city, "monthly"])?;
        let mut query = vec![
            ("months", months.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(start) = start_date {
            query.push(("startDate", start.to_string()));
        }
        Ok(self
            .get_json::<MonthlyRidesResponse>(url, &query)
            .await?
            .map(|r| r.data)
            .unwrap_or_default())
    }

    /// `GET /rides/summary`
    ///
    /// # Errors
    ///
    /// Returns [`RidesError`] on transport or server failures.
    pub async fn summary(&self, range: DateRange<'_>) -> Result<RidesSummary, RidesError> {
        let url = self.url(&["rides", "summary"])?;
        let mut query = Vec::new();
        if let Some(start) = range.start_date {
            query.push(("startDate", start.to_string()));
        }
        if let Some(end) = range.end_date {
            query.push(("endDate", end.to_string()));
        }
        Ok(self.get_json(url, &query).await?.unwrap_or(RidesSummary {
            total_rides: 0,
            total_revenue: 0.0,
            average_value: 0.0,
            top_cities: Vec::new(),
        }))
    }
}

#[async_trait]
impl RidesProvider for RidesClient {
    async fn city_monthly(&self, city: &str, months: u32) -> Result<Vec<MonthlyRides>, RidesError> {
        self.city_monthly_page(city, months, 1, None).await
    }

    async fn planning_revenue(&self, city: &str) -> Result<BTreeMap<MonthKey, f64>, RidesError> {
        let url = self.url(&["plannings", "revenue", city])?;
        Ok(self
            .get_json::<PlanningRevenueResponse>(url, &[])
            .await?
            .filter(|r| r.success)
            .map(|r| r.data)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_expires_after_ttl() {
        let cache = CitiesCache {
            fetched_at: Instant::now(),
            cities: vec!["Sorriso".to_string()],
        };
        let now = cache.fetched_at;
        assert!(cache.is_fresh(now + Duration::from_secs(29), CITIES_CACHE_TTL));
        assert!(!cache.is_fresh(now + Duration::from_secs(30), CITIES_CACHE_TTL));
    }

    #[test]
    fn urls_encode_city_names() {
        let client = RidesClient::new("http://localhost:3001").unwrap();
        let url = client
            .url(&["rides", "city", "Barra do Garças", "stats"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3001/rides/city/Barra%20do%20Gar%C3%A7as/stats"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(RidesClient::new("not a url").is_err());
    }
}
