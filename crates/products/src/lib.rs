//! Products domain module.
//!
//! Catalog entries, their categories and the stock properties derived from the
//! cached `current_qty`. Pure domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod product;

pub use category::Category;
pub use product::{
    CreateProduct, DEFAULT_PALLET_SIZE, Product, ProductRecord, UpdateProduct,
};
