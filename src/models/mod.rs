pub mod price;
pub mod sync;
