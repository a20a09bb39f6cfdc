//! `calculatePrice`: total cost of a stay.

use async_trait::async_trait;
use serde::Deserialize;
use staybot_core::error::ToolError;
use staybot_core::tool::{ParamKind, ParameterSpec, Tool, ToolDefinition, parse_arguments};

use crate::args::NumberArg;

pub const NAME: &str = "calculatePrice";

pub struct CalculatePriceTool;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    price_per_night: NumberArg,
    duration: NumberArg,
}

#[async_trait]
impl Tool for CalculatePriceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.into(),
            description: "When the user confirms the room and duration of stay in nights, calculate \
                the price of the room based on the duration of stay and the price per night of the \
                selected room. Display the total price to the user."
                .into(),
            parameters: vec![
                ParameterSpec::required(
                    "pricePerNight",
                    ParamKind::Number,
                    "The price per night of the room.",
                ),
                ParameterSpec::required(
                    "duration",
                    ParamKind::Number,
                    "The duration of stay in nights.",
                ),
            ],
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: Args = parse_arguments(NAME, arguments)?;
        let price = args.price_per_night.to_f64(NAME, "pricePerNight")?;
        let nights = args.duration.to_f64(NAME, "duration")?;
        Ok(format!("Total price: {}", price * nights))
    }
}
