//! Persistence for price records.
//!
//! Writes are upserts keyed by (state, market, commodity, variety, date), so
//! overlapping or repeated runs converge on the same stored set.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
    Select, Set,
};
use std::collections::BTreeMap;

use crate::entities::{mandi_prices, prelude::*};
use crate::error::SyncError;
use crate::models::price::{PriceKey, PriceQuery, PriceRecord};

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Insert the record or overwrite the one sharing its identity key.
    async fn upsert(&self, record: &PriceRecord) -> Result<(), SyncError>;

    async fn list(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, SyncError>;

    /// Delete records dated strictly before `cutoff`. Returns rows removed.
    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, SyncError>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct SeaOrmPriceStore {
    db: DatabaseConnection,
}

impl SeaOrmPriceStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Listing query: text filters ignore case, newest dates first.
    pub fn select_for(query: &PriceQuery) -> Select<MandiPrices> {
        let mut select = MandiPrices::find();

        let text_filters = [
            (mandi_prices::Column::State, &query.state),
            (mandi_prices::Column::Commodity, &query.commodity),
            (mandi_prices::Column::Market, &query.market),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value {
                select = select
                    .filter(Expr::expr(Func::lower(Expr::col(column))).eq(value.to_lowercase()));
            }
        }
        if let Some(date) = query.date {
            select = select.filter(mandi_prices::Column::PriceDate.eq(date));
        }

        select
            .order_by(mandi_prices::Column::PriceDate, Order::Desc)
            .order_by(mandi_prices::Column::State, Order::Asc)
            .order_by(mandi_prices::Column::Market, Order::Asc)
            .order_by(mandi_prices::Column::Commodity, Order::Asc)
            .order_by(mandi_prices::Column::Variety, Order::Asc)
            .limit(query.effective_limit())
    }
}

/// Prices are validated at full precision and stored at two decimal places
fn money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

fn rounded(record: &PriceRecord) -> PriceRecord {
    PriceRecord {
        min_price: record.min_price.map(money),
        max_price: record.max_price.map(money),
        modal_price: money(record.modal_price),
        ..record.clone()
    }
}

#[async_trait]
impl PriceStore for SeaOrmPriceStore {
    async fn upsert(&self, record: &PriceRecord) -> Result<(), SyncError> {
        let model = mandi_prices::ActiveModel {
            state: Set(record.state.clone()),
            district: Set(record.district.clone()),
            market: Set(record.market.clone()),
            commodity: Set(record.commodity.clone()),
            variety: Set(record.variety.clone().unwrap_or_default()),
            grade: Set(record.grade.clone()),
            min_price: Set(record.min_price.map(money)),
            max_price: Set(record.max_price.map(money)),
            modal_price: Set(money(record.modal_price)),
            price_date: Set(record.price_date),
            source_updated_at: Set(record.source_updated_at.fixed_offset()),
            ..Default::default()
        };

        MandiPrices::insert(model)
            .on_conflict(
                OnConflict::columns([
                    mandi_prices::Column::State,
                    mandi_prices::Column::Market,
                    mandi_prices::Column::Commodity,
                    mandi_prices::Column::Variety,
                    mandi_prices::Column::PriceDate,
                ])
                .update_columns([
                    mandi_prices::Column::District,
                    mandi_prices::Column::Grade,
                    mandi_prices::Column::MinPrice,
                    mandi_prices::Column::MaxPrice,
                    mandi_prices::Column::ModalPrice,
                    mandi_prices::Column::SourceUpdatedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn list(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, SyncError> {
        let rows = Self::select_for(query).all(&self.db).await?;

        Ok(rows.into_iter().map(PriceRecord::from).collect())
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, SyncError> {
        let result = MandiPrices::delete_many()
            .filter(mandi_prices::Column::PriceDate.lt(cutoff))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

/// In-process store used for dry runs and tests
#[derive(Default)]
pub struct MemoryPriceStore {
    records: RwLock<BTreeMap<PriceKey, PriceRecord>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn get(&self, key: &PriceKey) -> Option<PriceRecord> {
        self.records.read().get(key).cloned()
    }

    pub fn snapshot(&self) -> Vec<PriceRecord> {
        self.records.read().values().cloned().collect()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn upsert(&self, record: &PriceRecord) -> Result<(), SyncError> {
        self.records.write().insert(record.key(), rounded(record));
        Ok(())
    }

    async fn list(&self, query: &PriceQuery) -> Result<Vec<PriceRecord>, SyncError> {
        let mut matched: Vec<PriceRecord> = self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            b.price_date
                .cmp(&a.price_date)
                .then_with(|| a.key().cmp(&b.key()))
        });
        matched.truncate(query.effective_limit() as usize);

        Ok(matched)
    }

    async fn prune_before(&self, cutoff: NaiveDate) -> Result<u64, SyncError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|key, _| key.price_date >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
