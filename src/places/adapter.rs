use crate::schema::SearchResponse;

/// PlaceSearch is the seam between the generic collector loop and a
/// concrete place-search HTTP API.
///
/// An implementation sends exactly one search request per call and
/// reports every failure (transport, timeout, HTTP status, body decoding)
/// as an `Err`. Turning failures into "empty page, keep going" is the
/// collector's job, not the backend's.
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - The collector only borrows the backend, one request at a time
///
#[async_trait::async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Short backend name used in log lines (e.g. "google-places").
    fn name(&self) -> &'static str;

    /// Runs one text search.
    ///
    /// PARAMETERS:
    /// - `query`: full query text, e.g. "restaurants in Kraków"
    /// - `page_token`: `None` for the first page, otherwise the
    ///   `nextPageToken` of the previous response
    ///
    async fn search_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> anyhow::Result<SearchResponse>;
}
