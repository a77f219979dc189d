/// Collector module
///
/// This module groups the pagination and aggregation logic:
/// - Requesting single pages from a `PlaceSearch` backend
/// - Following continuation tokens per query, up to the result cap
/// - Concatenating all queries into one output list
///
/// API-specific logic MUST NOT live here; it belongs to the
/// backends in `places`.
pub mod runner;
