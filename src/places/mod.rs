//! Place search backends
//!
//! This module provides:
//! - The `PlaceSearch` trait the collector runs against
//! - The Google Places text search implementation
//!
//! The collector loop never talks HTTP directly. Everything
//! API-specific (headers, request body, status handling) lives in
//! the backend module.

pub mod adapter;
pub mod google;

pub use adapter::PlaceSearch;
pub use google::GooglePlacesClient;
