// storefront/src/models/mod.rs

//! Row types for the order, catalog and customer tables.

pub mod address;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

pub use address::Address;
pub use cart_item::{Cart, CartItem};
pub use order::{Order, OrderDetails, OrderStatus, PaymentStatus};
pub use order_item::OrderItem;
pub use product::Product;
pub use user::User;
