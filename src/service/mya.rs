//! Archiver sampler HTTP client
//!
//! Example request:
//!
//! ```text
//! GET /mySampler/data?b=2021-11-10 00:00:00&s=1h&n=2&m=history&channels=MQB0L09.BDL MQB0L10.BDL
//! ```
//!
//! Example response:
//!
//! ```json
//! {"data":[
//!   {"date":"2021-11-10T00:00:00","values":[{"MQB0L09.BDL":"405.921"},{"MQB0L10.BDL":"317.829"}]},
//!   {"date":"2021-11-10T01:00:00","values":[{"MQB0L09.BDL":"405.921"},{"MQB0L10.BDL":"317.829"}]}
//! ]}
//! ```

use super::{ChannelDataSource, SampleRequest, REQUEST_TIMEOUT};
use crate::error::{GraphError, Result};
use crate::types::{SampleRow, REQUEST_TIMESTAMP_FORMAT};
use reqwest::blocking::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SamplerResponse {
    data: Vec<SampleRow>,
}

#[derive(Debug, Deserialize)]
struct SamplerError {
    error: Option<String>,
}

/// Client for the archiver sampler web API
#[derive(Debug, Clone)]
pub struct MyaClient {
    url: String,
    http: Client,
}

impl MyaClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GraphError::from_http_error)?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Query parameters for a sampler request
    pub fn query_params(request: &SampleRequest) -> Vec<(&'static str, String)> {
        vec![
            ("b", request.begin.format(REQUEST_TIMESTAMP_FORMAT).to_string()),
            ("s", request.interval.clone()),
            ("n", request.steps.to_string()),
            ("m", request.deployment.clone()),
            ("channels", request.channels.join(" ")),
        ]
    }

    /// Message for a non-success response, preferring the server's own
    fn error_message(status: u16, body: &str) -> String {
        serde_json::from_str::<SamplerError>(body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| format!("Mya web server returned error status code {}", status))
    }

    fn parse_rows(body: &str) -> Result<Vec<SampleRow>> {
        let response: SamplerResponse = serde_json::from_str(body)?;
        Ok(response.data)
    }
}

impl ChannelDataSource for MyaClient {
    fn fetch_channel_data(&self, request: &SampleRequest) -> Result<Vec<SampleRow>> {
        tracing::debug!(
            "Sampling {} channels from {} ({} x {})",
            request.channels.len(),
            request.begin,
            request.steps,
            request.interval
        );

        let response = self
            .http
            .get(&self.url)
            .query(&Self::query_params(request))
            .send()
            .map_err(GraphError::from_http_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().map_err(GraphError::from_http_error)?;

        if !status.is_success() {
            tracing::warn!("Sampler request failed: {}", final_url);
            return Err(GraphError::service(Self::error_message(status.as_u16(), &body)));
        }
        Self::parse_rows(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;

    #[test]
    fn test_query_params() {
        let request = SampleRequest {
            channels: vec!["MQB0L09.BDL".to_string(), "MQB0L10.BDL".to_string()],
            begin: parse_timestamp("2021-11-10").unwrap(),
            interval: "1h".to_string(),
            steps: 2,
            deployment: "ops".to_string(),
        };
        let params = MyaClient::query_params(&request);
        assert_eq!(params[0].1, "2021-11-10 00:00:00");
        assert_eq!(params[2].1, "2");
        assert_eq!(params[4].1, "MQB0L09.BDL MQB0L10.BDL");
    }

    #[test]
    fn test_error_message_prefers_server_text() {
        assert_eq!(
            MyaClient::error_message(400, r#"{"error":"Unknown channel: X"}"#),
            "Unknown channel: X"
        );
        assert_eq!(
            MyaClient::error_message(502, "Bad Gateway"),
            "Mya web server returned error status code 502"
        );
    }

    #[test]
    fn test_parse_rows() {
        let rows = MyaClient::parse_rows(
            r#"{"data":[{"date":"2021-11-10T00:00:00","values":[{"A":"1"},{"B":"2"}]}]}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("B"), "2");
        assert!(MyaClient::parse_rows(r#"{"rows":[]}"#).is_err());
    }
}
