//! Network access and caching.

pub mod api;
pub mod cache;
