use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single place record as returned by the search API.
///
/// The collector never looks inside a place; records are written to the
/// output file exactly as received.
pub type Place = Map<String, Value>;

// ------------------------------------------------------------
// Search request
// ------------------------------------------------------------
//
// Body of one `places:searchText` call.
//
// `pageToken` is omitted on the first request of a query and
// carries the previous response's `nextPageToken` afterwards.
//
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    /// Free text query, e.g. "restaurants in Poznań"
    pub text_query: &'a str,

    /// Continuation token from the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<&'a str>,

    /// Requested number of places per page (API allows 1..=20)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Preferred language for display names and addresses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<&'a str>,
}

// ------------------------------------------------------------
// Search response
// ------------------------------------------------------------
//
// Both fields are optional on the wire. A response without
// `places` is a valid empty page; a response without
// `nextPageToken` is the last page.
//
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub places: Vec<Place>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl SearchResponse {
    /// Continuation token, ignoring the empty string some proxies send
    /// instead of omitting the field.
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}
