//! Read-through cache for the public price listing.
//!
//! Entries are dropped wholesale after every sync run, so the TTL only bounds
//! staleness for writes made outside this process.

use moka::future::Cache;
use std::time::Duration;

use crate::models::price::{PriceQuery, PriceRecord};

pub type PriceCache = Cache<PriceQuery, Vec<PriceRecord>>;

pub fn new_price_cache() -> PriceCache {
    Cache::builder()
        .max_capacity(1000) // Distinct filter combinations
        .time_to_live(Duration::from_secs(300)) // 5 minute TTL
        .build()
}
