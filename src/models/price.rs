use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::mandi_prices;

/// One commodity price observation, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub state: String,
    pub district: Option<String>,
    pub market: String,
    pub commodity: String,
    pub variety: Option<String>,
    pub grade: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub modal_price: Decimal,
    pub price_date: NaiveDate,
    pub source_updated_at: DateTime<Utc>,
}

/// Identity of a price record: (state, market, commodity, variety, date)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriceKey {
    pub state: String,
    pub market: String,
    pub commodity: String,
    pub variety: String,
    pub price_date: NaiveDate,
}

impl PriceRecord {
    pub fn key(&self) -> PriceKey {
        PriceKey {
            state: self.state.clone(),
            market: self.market.clone(),
            commodity: self.commodity.clone(),
            variety: self.variety.clone().unwrap_or_default(),
            price_date: self.price_date,
        }
    }
}

impl From<mandi_prices::Model> for PriceRecord {
    fn from(model: mandi_prices::Model) -> Self {
        Self {
            state: model.state,
            district: model.district,
            market: model.market,
            commodity: model.commodity,
            variety: Some(model.variety).filter(|v| !v.is_empty()),
            grade: model.grade,
            min_price: model.min_price,
            max_price: model.max_price,
            modal_price: model.modal_price,
            price_date: model.price_date,
            source_updated_at: model.source_updated_at.with_timezone(&Utc),
        }
    }
}

/// Filters for listing stored prices
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceQuery {
    pub state: Option<String>,
    pub commodity: Option<String>,
    pub market: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<u64>,
}

impl PriceQuery {
    pub const DEFAULT_LIMIT: u64 = 100;
    pub const MAX_LIMIT: u64 = 1000;

    pub fn effective_limit(&self) -> u64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Case-insensitive match used by the in-memory store
    pub fn matches(&self, record: &PriceRecord) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter
                .as_deref()
                .map_or(true, |f| f.eq_ignore_ascii_case(value))
        }

        eq(&self.state, &record.state)
            && eq(&self.commodity, &record.commodity)
            && eq(&self.market, &record.market)
            && self.date.map_or(true, |d| d == record.price_date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesResponse {
    pub prices: Vec<PriceRecord>,
    pub count: usize,
}
