//! Current time tool

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{ToolDefinition, ToolHandler};
use crate::{Error, Result};

/// Zone reported when the caller names none
pub const DEFAULT_TIMEZONE: &str = "Europe/Vienna";

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Deserialize)]
struct TimeParams {
    timezone: Option<String>,
}

#[derive(Debug, Serialize)]
struct TimeReport<'a> {
    time: String,
    timezone: &'a str,
}

/// Current wall-clock time
///
/// Zones are IANA names (`Europe/Vienna`) or fixed offsets such as `+02:00`.
#[derive(Debug, Clone)]
pub struct GetTime {
    home_zone: String,
}

impl GetTime {
    #[must_use]
    pub fn new(home_zone: impl Into<String>) -> Self {
        Self {
            home_zone: home_zone.into(),
        }
    }
}

/// Format `now` as wall-clock time in `zone`
fn time_in(zone: &str, now: DateTime<Utc>) -> Result<String> {
    if let Ok(tz) = zone.parse::<Tz>() {
        return Ok(now.with_timezone(&tz).format(TIME_FORMAT).to_string());
    }

    zone.parse::<FixedOffset>()
        .map(|offset| now.with_timezone(&offset).format(TIME_FORMAT).to_string())
        .map_err(|_| Error::Tool(format!("get_time: unknown timezone: {zone}")))
}

impl Default for GetTime {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

#[async_trait]
impl ToolHandler for GetTime {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "get_time",
            "Gibt die aktuelle Uhrzeit für eine Zeitzone zurück.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "description": "Die Zeitzone (z.B. Europe/Vienna)",
                        "default": DEFAULT_TIMEZONE,
                    },
                },
            }),
        )
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String> {
        let params: TimeParams = serde_json::from_value(arguments)
            .map_err(|e| Error::Tool(format!("get_time: {e}")))?;
        let timezone = params.timezone.as_deref().unwrap_or(&self.home_zone);

        let report = TimeReport {
            time: time_in(timezone, Utc::now())?,
            timezone,
        };
        Ok(serde_json::to_string(&report)?)
    }
}
