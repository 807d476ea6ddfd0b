//! Inventory and catalog HTTP client

use super::{InventoryQuery, InventorySource, TypeTreeSource, REQUEST_TIMEOUT};
use crate::error::{GraphError, Result, ResultExt};
use crate::hierarchy::TypeTree;
use crate::types::Element;
use reqwest::blocking::Client;
use serde::Deserialize;

/// Path of the element inventory endpoint
const INVENTORY_PATH: &str = "/inventory";

/// Path of the type hierarchy endpoint
const TYPE_TREE_PATH: &str = "/api/catalog/type-tree";

#[derive(Debug, Deserialize)]
struct InventoryResponse {
    stat: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "Inventory", default)]
    inventory: Option<InventoryBody>,
}

#[derive(Debug, Deserialize)]
struct InventoryBody {
    #[serde(default)]
    elements: Vec<Element>,
}

/// Client for the inventory web API
#[derive(Debug, Clone)]
pub struct CedClient {
    base_url: String,
    http: Client,
}

impl CedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GraphError::from_http_error)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Query parameters for an inventory request
    pub fn query_params(query: &InventoryQuery) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = Vec::new();
        params.extend(query.properties.iter().map(|p| ("p", p.clone())));
        params.push(("z", query.zone.clone()));
        params.extend(query.types.iter().map(|t| ("t", t.clone())));
        params.push(("r", "1".to_string()));
        params.push(("s", "S".to_string()));
        params.push(("out", "json".to_string()));
        params.extend(query.expressions.iter().map(|e| ("Ex", e.clone())));
        params
    }

    fn parse_inventory(body: &str) -> Result<Vec<Element>> {
        let response: InventoryResponse = serde_json::from_str(body)?;
        if response.stat != "ok" {
            return Err(GraphError::service(
                response
                    .message
                    .unwrap_or_else(|| format!("Inventory returned status '{}'", response.stat)),
            ));
        }
        response
            .inventory
            .map(|body| body.elements)
            .ok_or_else(|| GraphError::Parse("Inventory response has no element list".to_string()))
    }
}

impl InventorySource for CedClient {
    fn query_elements(&self, query: &InventoryQuery) -> Result<Vec<Element>> {
        let url = format!("{}{}", self.base_url, INVENTORY_PATH);
        tracing::debug!("Querying inventory zone={} types={:?}", query.zone, query.types);

        let response = self
            .http
            .get(&url)
            .query(&Self::query_params(query))
            .send()
            .map_err(GraphError::from_http_error)?;
        let final_url = response.url().to_string();
        let body = response.text().map_err(GraphError::from_http_error)?;

        let elements = Self::parse_inventory(&body).with_context(|| format!("GET {}", final_url))?;
        tracing::info!("Inventory returned {} elements", elements.len());
        Ok(elements)
    }
}

impl TypeTreeSource for CedClient {
    fn fetch_type_tree(&self) -> Result<TypeTree> {
        let url = format!("{}{}", self.base_url, TYPE_TREE_PATH);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(GraphError::from_http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::service(format!(
                "Catalog returned error status code {}",
                status.as_u16()
            )));
        }
        let body = response.text().map_err(GraphError::from_http_error)?;
        let tree: TypeTree = serde_json::from_str(&body)?;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_include_expressions() {
        let query = InventoryQuery::new(
            "Injector",
            vec!["Quad".to_string(), "BPM".to_string()],
            &[],
            vec!["S > 0.5".to_string()],
        );
        let params = CedClient::query_params(&query);
        let keys: Vec<_> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["p", "p", "z", "t", "t", "r", "s", "out", "Ex"]);
        assert!(params.contains(&("Ex", "S > 0.5".to_string())));
    }

    #[test]
    fn test_parse_inventory_ok() {
        let body = r#"{"stat":"ok","Inventory":{"elements":[
            {"type":"QD","name":"MQD0R05","properties":{"S":"80.43","EPICSName":"MQD0R05"}}
        ]}}"#;
        let elements = CedClient::parse_inventory(body).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].type_name, "QD");
        assert_eq!(elements[0].properties["S"], "80.43");
    }

    #[test]
    fn test_parse_inventory_error_status() {
        let body = r#"{"stat":"fail","message":"Unknown zone"}"#;
        let err = CedClient::parse_inventory(body).unwrap_err();
        assert!(matches!(err, GraphError::Service { ref message } if message == "Unknown zone"));
    }

    #[test]
    fn test_parse_inventory_garbage() {
        let err = CedClient::parse_inventory("<html>").unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }
}
