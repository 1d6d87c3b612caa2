//! HubSpot CRM v3 client for the deals object.
//!
//! [`DealSource`] is the seam the extraction loop runs against; the
//! reqwest-backed [`HubSpotClient`] is the production implementation.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::HubSpotConfig;

/// Deal properties requested on every page.
pub const DEAL_PROPERTIES: &[&str] = &[
    "dealname",
    "amount",
    "pipeline",
    "dealstage",
    "createdate",
    "hs_lastmodifieddate",
    "closedate",
    "deal_owner_id",
];

/// HubSpot's maximum page size for object listings.
pub const PAGE_LIMIT: u32 = 100;

const DEALS_PATH: &str = "/crm/v3/objects/deals";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to HubSpot failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HubSpot responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode HubSpot response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One page of `GET /crm/v3/objects/deals`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DealPage {
    #[serde(default)]
    pub results: Vec<RawDeal>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<NextPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextPage {
    pub after: String,
}

impl DealPage {
    /// Cursor for the following page, passed back verbatim.
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.as_str())
    }
}

/// A deal exactly as HubSpot returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDeal {
    pub id: RawId,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// HubSpot sends object ids as strings; numbers are accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawId::Number(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

#[async_trait]
pub trait DealSource: Send + Sync {
    /// Fetches a single page. `after` is the cursor from the previous page.
    async fn fetch_page(
        &self,
        properties: &[&str],
        after: Option<&str>,
    ) -> Result<DealPage, SourceError>;
}

pub struct HubSpotClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl HubSpotClient {
    pub fn new(config: &HubSpotConfig, access_token: impl Into<String>) -> Result<Self, SourceError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    pub fn deals_endpoint(&self) -> String {
        format!("{}{}", self.base_url, DEALS_PATH)
    }
}

#[async_trait]
impl DealSource for HubSpotClient {
    async fn fetch_page(
        &self,
        properties: &[&str],
        after: Option<&str>,
    ) -> Result<DealPage, SourceError> {
        let endpoint = self.deals_endpoint();
        let properties = properties.join(",");
        let limit = PAGE_LIMIT.to_string();
        let mut query = vec![("properties", properties.as_str()), ("limit", limit.as_str())];
        if let Some(cursor) = after {
            query.push(("after", cursor));
        }

        tracing::info!(has_cursor = after.is_some(), "Fetching deals page from HubSpot");

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("HubSpot API error: Status {}, URL: {}, Body: {}", status, endpoint, body);
            return Err(SourceError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        let page: DealPage = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            results = page.results.len(),
            has_next = page.next_cursor().is_some(),
            "Decoded HubSpot deals page"
        );
        Ok(page)
    }
}
