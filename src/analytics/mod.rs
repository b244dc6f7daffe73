//! Analytics over the product sale catalog.
//!
//! The [`services::AnalyticsService`] answers listing, statistics, histogram,
//! category and combined queries. It never writes to the catalog; every result
//! is computed from the transaction store on each request.

pub mod domain;
pub mod http;
pub mod services;
