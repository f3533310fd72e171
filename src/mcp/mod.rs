//! MCP server implementation for ctxvault.
//!
//! Exposes vault operations as MCP tools so agents can search, list and
//! write to their vaults. Engine calls block on disk I/O, so every tool runs
//! them on tokio's blocking pool.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorCode, ErrorData as McpError, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::Deserialize;

use crate::commands;
use crate::engine::{DEFAULT_TOP_K, VaultEngine, WriteOptions};
use crate::error::VaultError;
use crate::store::Filter;

/// Parameters for the `query` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    #[schemars(description = "Vault to search")]
    pub vault: String,
    #[schemars(description = "The search query")]
    pub query: String,
    #[schemars(description = "Maximum number of chunks (default: 5)")]
    pub top_k: Option<usize>,
    #[schemars(description = "Metadata equality filter, e.g. {\"filetype\": \"md\"}")]
    pub filter: Option<BTreeMap<String, String>>,
}

/// Parameters for the `write` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WriteParams {
    #[schemars(description = "Vault to write into")]
    pub vault: String,
    #[schemars(description = "Path relative to the vault root (.txt, .md or .docx)")]
    pub path: String,
    #[schemars(description = "Document content")]
    pub content: String,
    #[schemars(description = "Replace an existing document (default: false)")]
    pub overwrite: Option<bool>,
    #[schemars(description = "Name of the agent producing the content")]
    pub generated_by: Option<String>,
}

/// Parameters for the `list_docs` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListDocsParams {
    #[schemars(description = "Vault to list")]
    pub vault: String,
}

/// Parameters for the `index` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IndexParams {
    #[schemars(description = "Vault to index")]
    pub vault: String,
    #[schemars(description = "File or directory relative to the vault root (default: all)")]
    pub path: Option<String>,
}

/// MCP server exposing ctxvault tools.
#[derive(Clone)]
pub struct CtxVaultServer {
    engine: Arc<VaultEngine>,
    tool_router: ToolRouter<Self>,
}

fn tool_error(context: &str, err: &VaultError) -> McpError {
    let code = if err.is_caller_error() {
        ErrorCode::INVALID_PARAMS
    } else {
        ErrorCode::INTERNAL_ERROR
    };
    McpError {
        code,
        message: Cow::from(format!("{context}: {err}")),
        data: None,
    }
}

fn text_result(output: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(output)])
}

impl CtxVaultServer {
    /// Run an engine call on the blocking pool.
    async fn blocking<T, F>(&self, context: &str, call: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&VaultEngine) -> Result<T, VaultError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || call(&engine))
            .await
            .map_err(|e| McpError {
                code: ErrorCode::INTERNAL_ERROR,
                message: Cow::from(format!("{context}: task failed: {e}")),
                data: None,
            })?
            .map_err(|e| tool_error(context, &e))
    }
}

#[tool_router]
impl CtxVaultServer {
    #[must_use]
    pub fn new(engine: Arc<VaultEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Semantic search over a vault's indexed documents")]
    async fn query(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let top_k = params.top_k.unwrap_or(DEFAULT_TOP_K);
        let filter: Option<Filter> = params.filter.map(|f| f.into_iter().collect());

        let hits = self
            .blocking("Query failed", move |engine| {
                engine.query(&params.vault, &params.query, top_k, filter.as_ref())
            })
            .await?;

        Ok(text_result(commands::format_hits(&hits)))
    }

    #[tool(description = "Write a new document into a vault and index it")]
    async fn write(
        &self,
        Parameters(params): Parameters<WriteParams>,
    ) -> Result<CallToolResult, McpError> {
        let options = WriteOptions {
            overwrite: params.overwrite.unwrap_or(false),
            generated_by: params.generated_by,
        };

        let written = self
            .blocking("Write failed", move |engine| {
                engine.write_document(
                    &params.vault,
                    &PathBuf::from(&params.path),
                    &params.content,
                    &options,
                )
            })
            .await?;

        Ok(text_result(format!(
            "Written: {} ({} chunks)",
            written.path.display(),
            written.chunks
        )))
    }

    #[tool(description = "List all vaults")]
    async fn list_vaults(&self) -> Result<CallToolResult, McpError> {
        let vaults = self
            .blocking("List vaults failed", VaultEngine::list_vaults)
            .await?;
        Ok(text_result(commands::format_vaults(&vaults)))
    }

    #[tool(description = "List the documents indexed in a vault")]
    async fn list_docs(
        &self,
        Parameters(params): Parameters<ListDocsParams>,
    ) -> Result<CallToolResult, McpError> {
        let documents = self
            .blocking("List documents failed", move |engine| {
                engine.list_documents(&params.vault)
            })
            .await?;
        Ok(text_result(commands::format_documents(&documents)))
    }

    #[tool(description = "Index a file or directory of a vault")]
    async fn index(
        &self,
        Parameters(params): Parameters<IndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self
            .blocking("Index failed", move |engine| {
                engine.index(&params.vault, params.path.as_deref().map(PathBuf::from).as_deref())
            })
            .await?;
        Ok(text_result(commands::format_outcome("Indexed", &outcome)))
    }
}

#[tool_handler]
impl ServerHandler for CtxVaultServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "ctxvault gives agents semantic memory over document vaults. \
                Use query to search a vault, write to save new documents, \
                list_vaults and list_docs to browse, and index to pick up new files."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Start the MCP server with stdio transport.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a fatal error.
pub async fn serve(engine: VaultEngine) -> anyhow::Result<()> {
    let server = CtxVaultServer::new(Arc::new(engine));
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
