//! HTTP surface for pulse: the scrape endpoint plus JSON and text query
//! routes over the same store.

pub mod metrics_routes;
pub mod server;
pub mod state;
