//! Domain models for the directory.
//!
//! These are validated domain objects, independent of the row types each
//! store implementation uses internally.

pub mod actor;
pub mod shop;

pub use actor::Actor;
pub use shop::{NewPickup, NewShop, Pickup, Shipping, ShippingLink, Shop, ShopFields};
