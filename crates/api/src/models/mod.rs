//! Domain models shared between repositories, services, and routes.

pub mod order;
pub mod user;

pub use order::{Order, OrderCounts, OrderItem, OrderWithItems, ShippingDetail};
pub use user::CurrentUser;

use serde::Serialize;

/// Pagination metadata returned with list responses.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PageMeta {
    /// Build metadata for a page of `total_items` results.
    #[must_use]
    pub const fn new(page: u32, page_size: u32, total_items: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_items.div_ceil(page_size as u64)
        };
        Self {
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}
