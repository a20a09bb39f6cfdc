//! Hotel tools for staybot.
//!
//! The assistant can do exactly two things besides talking: price a stay and
//! book a room. Both are registered at startup by [`hotel_registry`].

mod args;
pub mod book_room;
pub mod calculate_price;
pub mod hotel_api;

use staybot_core::tool::ToolRegistry;
use std::sync::Arc;

pub use book_room::BookRoomTool;
pub use calculate_price::CalculatePriceTool;
pub use hotel_api::{BookingRequest, HotelApi, HotelApiError, RoomInventory};

/// Create the tool registry the assistant runs with.
pub fn hotel_registry(api: Arc<HotelApi>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatePriceTool));
    registry.register(Arc::new(BookRoomTool::new(api)));
    registry
}
