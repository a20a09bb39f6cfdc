//! Client for the hotel REST service.
//!
//! Two endpoints:
//! - `GET  /rooms` returns a JSON array of room records
//! - `POST /book`  takes `{fullName, email, nights, roomId}` and answers `{bookingId, ...}`

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum HotelApiError {
    #[error("Hotel API request failed: {0}")]
    Network(String),

    #[error("Hotel API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected hotel API response: {0}")]
    InvalidBody(String),
}

/// The room inventory as served by the hotel API.
#[derive(Debug, Clone)]
pub struct RoomInventory {
    /// Response body, untouched
    pub raw: String,
    /// Parsed room records, extra fields preserved
    pub rooms: Vec<serde_json::Value>,
}

impl RoomInventory {
    /// Validate a response body: it must be a JSON array.
    pub fn parse(body: &str) -> Result<Self, HotelApiError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| HotelApiError::InvalidBody(format!("rooms is not JSON: {e}")))?;
        match value {
            serde_json::Value::Array(rooms) => Ok(Self {
                raw: body.trim().to_string(),
                rooms,
            }),
            other => Err(HotelApiError::InvalidBody(format!(
                "expected a JSON array of rooms, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Body of `POST /book`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub full_name: String,
    pub email: String,
    pub nights: serde_json::Number,
    pub room_id: serde_json::Number,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingResponse {
    booking_id: Option<serde_json::Value>,
}

/// HTTP client for the hotel service.
#[derive(Debug, Clone)]
pub struct HotelApi {
    client: reqwest::Client,
    base_url: String,
}

impl HotelApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the room inventory.
    pub async fn fetch_rooms(&self) -> Result<RoomInventory, HotelApiError> {
        let url = format!("{}/rooms", self.base_url);
        debug!(%url, "Fetching room inventory");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HotelApiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HotelApiError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(HotelApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let inventory = RoomInventory::parse(&body)?;
        info!(rooms = inventory.len(), "Room inventory loaded");
        Ok(inventory)
    }

    /// Book a room and return the booking id.
    pub async fn book(&self, request: &BookingRequest) -> Result<String, HotelApiError> {
        let url = format!("{}/book", self.base_url);
        debug!(%url, room_id = %request.room_id, nights = %request.nights, "Submitting booking");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| HotelApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HotelApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BookingResponse = response
            .json()
            .await
            .map_err(|e| HotelApiError::InvalidBody(e.to_string()))?;

        match parsed.booking_id {
            Some(serde_json::Value::String(id)) => Ok(id),
            Some(serde_json::Value::Null) | None => Err(HotelApiError::InvalidBody(
                "booking response has no bookingId".into(),
            )),
            Some(other) => Ok(other.to_string()),
        }
    }
}
