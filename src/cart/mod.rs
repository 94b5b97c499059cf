//! Shopping Cart Module
//!
//! Cart identity and validation, tier pricing, and the cart engine that
//! mutates items through the store.

pub mod engine;
pub mod helpers;
pub mod models;
pub mod pricing;
pub mod validate;

pub use engine::CartEngine;
