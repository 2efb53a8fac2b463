//! Business logic services for the order API.
//!
//! # Services
//!
//! - `orders` - Order placement workflow (reserve, price, invoice, enqueue)
//! - `shipping` - Carrier rate quotes (destination lookup + cost)
//! - `payments` - Payment gateway invoices

pub mod orders;
pub mod payments;
pub mod shipping;

pub use orders::OrderService;
pub use payments::PaymentClient;
pub use shipping::ShippingClient;
