//! Client for the external tool-serving backend.
//!
//! Tools are served over HTTP by a toolbox server: a toolset manifest
//! describes the available functions and each tool is invoked with a JSON
//! object of arguments. The runtime only sees the [`ToolExecutor`] trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_realtime::types::FunctionDeclaration;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Executes tool calls requested by the model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// The functions advertised to the model at session setup.
    fn declarations(&self) -> Vec<FunctionDeclaration>;

    /// Runs a tool and returns its raw result payload.
    async fn invoke(&self, name: &str, args: Value) -> Result<String>;
}

#[derive(Deserialize, Debug)]
struct ToolsetManifest {
    #[serde(default)]
    tools: BTreeMap<String, ToolManifest>,
}

#[derive(Deserialize, Debug)]
struct ToolManifest {
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<ParameterManifest>,
}

#[derive(Deserialize, Debug)]
struct ParameterManifest {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_required")]
    required: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Deserialize, Debug)]
struct InvokeResponse {
    result: Value,
}

/// A `ToolExecutor` backed by a toolbox HTTP server.
pub struct ToolboxClient {
    http: reqwest::Client,
    base_url: String,
    declarations: Vec<FunctionDeclaration>,
}

impl ToolboxClient {
    /// A client that advertises no tools.
    pub fn empty(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            declarations: Vec::new(),
        }
    }

    /// Fetches the manifest for `toolset` and builds a client advertising its tools.
    #[instrument(skip_all, fields(%base_url, %toolset))]
    pub async fn load(base_url: &str, toolset: &str) -> Result<Self> {
        let mut client = Self::empty(base_url);
        let url = format!("{}/api/toolset/{}", client.base_url, toolset);
        let manifest: ToolsetManifest = client
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach toolbox at {}", url))?
            .error_for_status()?
            .json()
            .await
            .context("Toolbox returned an invalid toolset manifest")?;

        client.declarations = declarations_from_manifest(manifest);
        info!(tools = client.declarations.len(), "Loaded toolset");
        Ok(client)
    }
}

#[async_trait]
impl ToolExecutor for ToolboxClient {
    fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.declarations.clone()
    }

    #[instrument(skip(self, args))]
    async fn invoke(&self, name: &str, args: Value) -> Result<String> {
        let url = format!("{}/api/tool/{}/invoke", self.base_url, name);
        let response: InvokeResponse = self
            .http
            .post(&url)
            .json(&args)
            .send()
            .await
            .with_context(|| format!("Failed to reach toolbox at {}", url))?
            .error_for_status()?
            .json()
            .await
            .context("Toolbox returned an invalid invoke response")?;

        Ok(match response.result {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }
}

fn declarations_from_manifest(manifest: ToolsetManifest) -> Vec<FunctionDeclaration> {
    manifest
        .tools
        .into_iter()
        .map(|(name, tool)| {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for param in tool.parameters {
                properties.insert(
                    param.name.clone(),
                    json!({
                        "type": schema_type(&param.kind),
                        "description": param.description,
                    }),
                );
                if param.required {
                    required.push(Value::String(param.name));
                }
            }
            let parameters = (!properties.is_empty()).then(|| {
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            });
            FunctionDeclaration {
                name,
                description: tool.description,
                parameters,
            }
        })
        .collect()
}

/// Maps toolbox parameter types onto JSON schema types.
fn schema_type(kind: &str) -> &'static str {
    match kind {
        "integer" => "integer",
        "float" | "number" => "number",
        "boolean" => "boolean",
        "array" => "array",
        _ => "string",
    }
}
