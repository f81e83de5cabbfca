pub use super::mandi_prices::Entity as MandiPrices;
pub use super::sync_status::Entity as SyncStatus;
