//! Weather tool backed by the OpenWeatherMap HTTP API.
//!
//! A lookup is two requests: the city is geocoded through
//! `/geo/1.0/direct`, then current conditions for the first match are read
//! from `/data/2.5/weather`. The API key travels as the `appid` query
//! parameter on both.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use yugent_core::error::ToolError;
use yugent_core::schema::PropertyMap;
use yugent_core::tool::Tool;

use crate::DeclaredInput;

pub const NAME: &str = "get_weather";

static INPUT: DeclaredInput = DeclaredInput::new(
    r#"
    interface Example {
      /**
       * City to query the weather for
       */
      city: string

      /**
       * Unit in which the temperature should be printed, possible options are "F" or "C"
       */
      unit: string
    }
    "#,
);

#[derive(Debug, Deserialize)]
struct WeatherInput {
    city: String,
    #[serde(default = "default_unit")]
    unit: String,
}

fn default_unit() -> String {
    "C".into()
}

#[derive(Debug, Deserialize)]
struct GeoMatch {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: MainReading,
    wind: WindReading,
}

#[derive(Debug, Deserialize)]
struct MainReading {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct WindReading {
    speed: f64,
}

pub struct WeatherTool {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Read the API key from `env_var`; an unset variable yields an empty key.
    pub fn from_env(base_url: &str, env_var: &str) -> Self {
        Self::new(base_url, std::env::var(env_var).unwrap_or_default())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| failed(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("{path} returned {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| failed(format!("invalid response from {path}: {e}")))
    }
}

fn failed(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: NAME.into(),
        reason,
    }
}

/// `"F"` selects imperial units; anything else is metric.
fn units_for(unit: &str) -> &'static str {
    if unit == "F" { "imperial" } else { "metric" }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Get's weather for city"
    }

    fn parameters(&self) -> Option<&PropertyMap> {
        INPUT.properties()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let input: WeatherInput =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        let matches: Vec<GeoMatch> = self
            .get_json(
                "/geo/1.0/direct",
                &[("q", input.city.clone()), ("limit", "1".into())],
            )
            .await?;
        let Some(place) = matches.first() else {
            return Err(failed(format!(
                "failed to get coordinates for city '{}'",
                input.city
            )));
        };
        debug!(city = %input.city, lat = place.lat, lon = place.lon, "Geocoded city");

        let weather: CurrentWeather = self
            .get_json(
                "/data/2.5/weather",
                &[
                    ("lat", place.lat.to_string()),
                    ("lon", place.lon.to_string()),
                    ("units", units_for(&input.unit).into()),
                ],
            )
            .await?;

        Ok(json!({
            "temperature": weather.main.temp,
            "unit": input.unit,
            "wind": weather.wind.speed,
        }))
    }
}
