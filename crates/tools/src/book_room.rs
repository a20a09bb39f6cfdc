//! `bookRoom`: places a booking through the hotel API.

use async_trait::async_trait;
use serde::Deserialize;
use staybot_core::error::ToolError;
use staybot_core::tool::{ParamKind, ParameterSpec, Tool, ToolDefinition, parse_arguments};
use std::sync::Arc;
use tracing::info;

use crate::args::NumberArg;
use crate::hotel_api::{BookingRequest, HotelApi};

pub const NAME: &str = "bookRoom";

pub struct BookRoomTool {
    api: Arc<HotelApi>,
}

impl BookRoomTool {
    pub fn new(api: Arc<HotelApi>) -> Self {
        Self { api }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    full_name: String,
    email: String,
    duration: NumberArg,
    room_id: NumberArg,
}

#[async_trait]
impl Tool for BookRoomTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.into(),
            description: "Book the room for the user, only when the user has provided all details. \
                Return the booking id."
                .into(),
            parameters: vec![
                ParameterSpec::required("fullName", ParamKind::String, "The full name of the user."),
                ParameterSpec::required("email", ParamKind::String, "The email of the user."),
                ParameterSpec::required(
                    "duration",
                    ParamKind::Number,
                    "The duration of stay in nights.",
                ),
                ParameterSpec::required("roomId", ParamKind::Number, "The id of the room booked."),
            ],
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: Args = parse_arguments(NAME, arguments)?;
        let request = BookingRequest {
            full_name: args.full_name,
            email: args.email,
            nights: args.duration.to_number(NAME, "duration")?,
            room_id: args.room_id.to_number(NAME, "roomId")?,
        };

        let booking_id = self
            .api
            .book(&request)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        info!(%booking_id, room_id = %request.room_id, "Room booked");
        Ok(format!("Booking id: {booking_id}"))
    }
}
