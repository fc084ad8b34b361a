/// Tool reporting the current weather for a city
///
/// This module implements the getWeather MCP tool on top of the OpenWeather
/// current-weather endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{parse_base_url, ConfigError};
use crate::mcp::protocol::ToolDescriptor;
use crate::tools::{input_schema, parse_arguments, text_result, Tool, ToolError};
use crate::ServerError;

pub const TOOL_NAME: &str = "getWeather";

/// Public OpenWeather API host
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Current-weather endpoint, relative to the base URL
const CURRENT_WEATHER_PATH: &str = "data/2.5/weather";

/// Arguments of getWeather
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// City to look up (e.g. Seoul, London)
    pub city: String,
}

/// Settings for the weather backend
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// OpenWeather API key; calls fail with a tool error without one
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Subset of the OpenWeather current-weather response we report on
#[derive(Debug, Deserialize)]
pub struct CurrentWeather {
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub description: String,
}

pub struct WeatherTool {
    client: reqwest::Client,
    endpoint: Url,
    config: WeatherConfig,
}

impl WeatherTool {
    /// Build the tool, rejecting a base URL that cannot reach an HTTP API
    pub fn new(config: WeatherConfig) -> Result<Self, ServerError> {
        let endpoint = parse_base_url(&config.base_url)?
            .join(CURRENT_WEATHER_PATH)
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{} ({})", config.base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// URL the current-weather request is sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn fetch(&self, city: &str, api_key: &str) -> Result<Value, ToolError> {
        debug!("Fetching weather for {} from {}", city, self.endpoint);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .map_err(|e| {
                warn!("Weather request failed: {}", e);
                ToolError::new("Failed to retrieve weather data")
            })?;

        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::new(format!("Error parsing weather data: {}", e)))
    }
}

/// Turn an OpenWeather response body into the report shown to the client
///
/// The API signals failures in-band through `cod`, which is a number on
/// success and often a string on errors.
pub fn weather_report(city: &str, body: Value) -> Result<String, ToolError> {
    let succeeded = match body.get("cod") {
        None => true,
        Some(Value::Number(code)) => code.as_i64() == Some(200),
        Some(Value::String(code)) => code == "200",
        Some(_) => false,
    };
    if !succeeded {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(ToolError::new(format!("Error: {}", message)).with_data(body.clone()));
    }

    let current: CurrentWeather = serde_json::from_value(body)
        .map_err(|e| ToolError::new(format!("Error parsing weather data: {}", e)))?;
    let conditions = current
        .weather
        .iter()
        .map(|c| c.description.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "🌤️ Current weather in {}:\n\nTemperature: {:.1} °C\nFeels like: {:.1} °C\nHumidity: {:.0} %\nConditions: {}\n",
        city,
        current.main.temp,
        current.main.feels_like,
        current.main.humidity,
        if conditions.is_empty() { "unknown" } else { conditions.as_str() }
    ))
}

#[async_trait]
impl Tool for WeatherTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: "Returns the current weather for a city.".to_string(),
            input_schema: input_schema::<WeatherArgs>(),
        }
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let args: WeatherArgs = parse_arguments(arguments)?;
        let city = args.city.trim();
        if city.is_empty() {
            return Err(ToolError::new("Invalid arguments: 'city' cannot be empty"));
        }

        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(ToolError::new("OpenWeather API key is not configured")),
        };

        let body = self.fetch(city, api_key).await?;
        let report = weather_report(city, body)?;
        text_result(report)
    }
}
