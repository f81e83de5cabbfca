pub mod mandi_price_sync;
