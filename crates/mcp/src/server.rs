use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use baton_core::remote::{
    ContentPart, RemoteError, RemoteTool, RemoteToolProvider,
};
use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{Peer, RoleClient, RunningService, ServiceError};
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransportConfig,
};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use serde_json::{Map, Value, json};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time;

use crate::config::{McpConfig, TransportConfig};
use crate::convert;
use crate::error::{Error, ErrorKind};

type Service = RunningService<RoleClient, ()>;

/// A connection to an MCP server.
///
/// The connection is initialized by [`McpServer::connect`] and can be
/// registered on agents as a [`RemoteToolProvider`]. Wrap it in an [`Arc`]
/// to share it between agents.
pub struct McpServer {
    name: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<Service>>,
    timeout: Duration,
}

impl McpServer {
    /// Connects to the server described by `config` and performs the
    /// initialization handshake.
    pub async fn connect(config: &McpConfig) -> Result<Self, Error> {
        let (label, timeout) = (config.label(), config.timeout());
        match config.transport() {
            TransportConfig::Stdio { command, args, env } => {
                let mut cmd = Command::new(command);
                cmd.args(args).envs(env.iter().map(|(key, val)| (key, val)));
                let transport = TokioChildProcess::new(cmd).map_err(|err| {
                    let message = format!("failed to spawn {command}: {err}");
                    Error::transport(message)
                })?;
                Self::start(().serve(transport), label, timeout).await
            }
            TransportConfig::Http { url, bearer_token } => {
                let mut http =
                    StreamableHttpClientTransportConfig::with_uri(url.as_str());
                if let Some(token) = bearer_token {
                    http = http.auth_header(token.clone());
                }
                let transport =
                    StreamableHttpClientTransport::from_config(http);
                Self::start(().serve(transport), label, timeout).await
            }
        }
    }

    /// Waits for the handshake driven by `pending` and wraps the running
    /// service. Dropping `pending` on timeout drops its transport.
    pub(crate) async fn start<F, E>(
        pending: F,
        label: String,
        timeout: Duration,
    ) -> Result<Self, Error>
    where
        F: Future<Output = Result<Service, E>>,
        E: Display,
    {
        let service = match time::timeout(timeout, pending).await {
            Ok(Ok(service)) => service,
            Ok(Err(err)) => {
                return Err(Error::protocol(format!(
                    "failed to initialize {label}: {err}"
                )));
            }
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::Timeout,
                    format!("no response to initialize in {timeout:?}"),
                ));
            }
        };

        let peer = service.peer().clone();
        let name = peer
            .peer_info()
            .map(|info| info.server_info.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or(label);
        info!("connected to mcp server {name}");
        Ok(Self {
            name,
            peer,
            service: Mutex::new(Some(service)),
            timeout,
        })
    }

    async fn request<T>(
        &self,
        method: &str,
        pending: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, Error> {
        if self.service.lock().await.is_none() {
            return Err(Error::new(
                ErrorKind::Closed,
                format!("{} is closed", self.name),
            ));
        }
        debug!("{} <- {method}", self.name);
        match time::timeout(self.timeout, pending).await {
            Ok(result) => result.map_err(service_error),
            Err(_) => Err(Error::new(
                ErrorKind::Timeout,
                format!("no response to {method} in {:?}", self.timeout),
            )),
        }
    }

    /// Returns the server's name, or the command or URL used to reach it if
    /// the server did not report one.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lists every tool the server serves, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, Error> {
        let tools = self
            .request("tools/list", self.peer.list_all_tools())
            .await?;
        debug!("{} serves {} tools", self.name, tools.len());
        Ok(tools.into_iter().map(convert::remote_tool).collect())
    }

    /// Calls a tool and returns the parts of its result.
    ///
    /// A result flagged as an error is still returned as content so the
    /// model can read the error message.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Vec<ContentPart>, Error> {
        let params: CallToolRequestParams =
            serde_json::from_value(json!({
                "name": name,
                "arguments": arguments,
            }))
            .map_err(|err| Error::protocol(err.to_string()))?;
        let result = self
            .request("tools/call", self.peer.call_tool(params))
            .await?;
        if result.is_error == Some(true) {
            warn!("{} reported an error from tool {name}", self.name);
        }
        Ok(result
            .content
            .into_iter()
            .filter_map(convert::content_part)
            .collect())
    }

    /// Shuts the connection down. Closing twice is a no-op.
    ///
    /// Dropping the server without closing it also ends the connection and
    /// kills a stdio child.
    pub async fn close(&self) -> Result<(), Error> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        debug!("closing mcp server {}", self.name);
        match service.cancel().await {
            Ok(reason) => {
                trace!("{} stopped: {reason:?}", self.name);
                Ok(())
            }
            Err(err) => Err(Error::transport(format!(
                "failed to stop {}: {err}",
                self.name
            ))),
        }
    }
}

fn service_error(err: ServiceError) -> Error {
    match err {
        ServiceError::McpError(data) => Error::new(
            ErrorKind::Server,
            format!("{} (code {})", data.message, data.code.0),
        ),
        ServiceError::TransportClosed => {
            Error::new(ErrorKind::Closed, "the connection is closed")
        }
        err => Error::transport(err.to_string()),
    }
}

#[async_trait]
impl RemoteToolProvider for McpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<RemoteTool>, RemoteError> {
        Ok(McpServer::list_tools(self).await?)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Vec<ContentPart>, RemoteError> {
        Ok(McpServer::call_tool(self, name, arguments).await?)
    }
}

/// Connects to a server, lists its tools, runs `f` with both, and closes
/// the connection.
///
/// The connection is closed however `f` finishes; its output is returned
/// unchanged. A failure to list the tools closes the connection and is
/// returned as an error.
///
/// ```no_run
/// # async fn example() -> Result<(), baton_mcp::Error> {
/// use baton_mcp::McpConfigBuilder;
///
/// let config = McpConfigBuilder::stdio("mcp-server-fetch").build();
/// let names = baton_mcp::scoped(&config, |server, tools| async move {
///     let names: Vec<_> = tools.into_iter().map(|tool| tool.name).collect();
///     format!("{} serves {}", server.name(), names.join(", "))
/// })
/// .await?;
/// println!("{names}");
/// # Ok(())
/// # }
/// ```
pub async fn scoped<F, Fut, T>(config: &McpConfig, f: F) -> Result<T, Error>
where
    F: FnOnce(Arc<McpServer>, Vec<RemoteTool>) -> Fut,
    Fut: Future<Output = T>,
{
    let server = Arc::new(McpServer::connect(config).await?);
    run_scoped(server, f).await
}

async fn run_scoped<F, Fut, T>(server: Arc<McpServer>, f: F) -> Result<T, Error>
where
    F: FnOnce(Arc<McpServer>, Vec<RemoteTool>) -> Fut,
    Fut: Future<Output = T>,
{
    struct CloseGuard(Option<Arc<McpServer>>);

    impl CloseGuard {
        async fn close(mut self) {
            if let Some(server) = self.0.take() {
                if let Err(err) = server.close().await {
                    warn!("failed to close {}: {err}", server.name);
                }
            }
        }
    }

    impl Drop for CloseGuard {
        fn drop(&mut self) {
            // Reached only when the block was cancelled or panicked. The
            // connection ends once the last handle is dropped.
            if let Some(server) = self.0.take() {
                warn!("{} was not closed cleanly", server.name);
            }
        }
    }

    let guard = CloseGuard(Some(Arc::clone(&server)));
    let tools = match server.list_tools().await {
        Ok(tools) => tools,
        Err(err) => {
            guard.close().await;
            return Err(err);
        }
    };
    let output = f(server, tools).await;
    guard.close().await;
    Ok(output)
}
