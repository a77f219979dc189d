use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;

use crate::{
    config::ApiConfig,
    schema::{SearchRequest, SearchResponse},
};

use super::adapter::PlaceSearch;

const API_KEY_HEADER: &str = "X-Goog-Api-Key";
const FIELD_MASK_HEADER: &str = "X-Goog-FieldMask";

/// Longest slice of an error body copied into the error message.
const ERROR_BODY_PREVIEW: usize = 200;

/// Google Places (New) `places:searchText` backend.
///
/// Holds the credential, endpoint and field mask for the whole run.
/// One instance is built in `main` and borrowed by the collector.
pub struct GooglePlacesClient {
    http: Client,
    url: String,
    api_key: String,
    field_mask: String,
    page_size: Option<u32>,
    language_code: Option<String>,
}

impl GooglePlacesClient {
    /// Builds the backend with its own reqwest client using the configured
    /// request timeout.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Self::with_http_client(http, api)
    }

    pub fn with_http_client(http: Client, api: &ApiConfig) -> Result<Self> {
        let api_key = api
            .key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("Places API key is missing")?;

        Ok(Self {
            http,
            url: api.url.clone(),
            api_key,
            field_mask: api.field_mask.join(","),
            page_size: api.page_size,
            language_code: api.language_code.clone(),
        })
    }
}

#[async_trait::async_trait]
impl PlaceSearch for GooglePlacesClient {
    fn name(&self) -> &'static str {
        "google-places"
    }

    async fn search_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<SearchResponse> {
        let body = SearchRequest {
            text_query: query,
            page_token,
            page_size: self.page_size,
            language_code: self.language_code.as_deref(),
        };

        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(FIELD_MASK_HEADER, &self.field_mask)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            // The API explains quota and key errors in the body
            let text = response.text().await.unwrap_or_default();
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            bail!("HTTP {status}: {preview}");
        }

        response
            .json::<SearchResponse>()
            .await
            .context("decoding search response")
    }
}
