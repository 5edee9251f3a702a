//! Weather lookup tool

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ToolDefinition, ToolHandler};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct WeatherParams {
    location: String,
}

#[derive(Debug, Serialize)]
struct WeatherReport<'a> {
    temperature: i32,
    condition: &'a str,
    location: &'a str,
}

/// Current weather for a location
///
/// Returns a fixed sample report until a weather provider is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetWeather;

#[async_trait]
impl ToolHandler for GetWeather {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "get_weather",
            "Gibt das aktuelle Wetter für einen bestimmten Ort zurück.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "Der Ort für den das Wetter abgefragt werden soll (z.B. Vienna, Berlin, etc.)",
                    },
                },
                "required": ["location"],
            }),
        )
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String> {
        let params: WeatherParams = serde_json::from_value(arguments)
            .map_err(|e| Error::Tool(format!("get_weather: {e}")))?;

        let report = WeatherReport {
            temperature: 22,
            condition: "sonnig",
            location: &params.location,
        };
        Ok(serde_json::to_string(&report)?)
    }
}
