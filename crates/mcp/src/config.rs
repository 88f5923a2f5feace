use std::fmt::{self, Debug};
use std::time::Duration;

/// The default timeout of a single MCP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How to reach an MCP server.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TransportConfig {
    /// Spawn a subprocess and talk JSON-RPC over its stdin and stdout.
    Stdio {
        /// The program to run.
        command: String,
        /// Its arguments.
        args: Vec<String>,
        /// Extra environment variables.
        env: Vec<(String, String)>,
    },
    /// Connect to a streamable HTTP endpoint. Responses may arrive as
    /// server-sent events.
    Http {
        /// The URL of the endpoint.
        url: String,
        /// A bearer token sent with every request.
        bearer_token: Option<String>,
    },
}

impl Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens and environment values often carry credentials.
        match self {
            TransportConfig::Stdio { command, args, env } => {
                let env: Vec<_> = env
                    .iter()
                    .map(|(key, _)| format!("{key}=<redacted>"))
                    .collect();
                f.debug_struct("Stdio")
                    .field("command", command)
                    .field("args", args)
                    .field("env", &env)
                    .finish()
            }
            TransportConfig::Http { url, bearer_token } => f
                .debug_struct("Http")
                .field("url", url)
                .field(
                    "bearer_token",
                    &bearer_token.as_ref().map(|_| "<redacted>"),
                )
                .finish(),
        }
    }
}

/// Builder for [`McpConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct McpConfigBuilder {
    transport: TransportConfig,
    timeout: Duration,
}

impl McpConfigBuilder {
    /// Creates a builder for a server run as a subprocess.
    #[inline]
    pub fn stdio<S: Into<String>>(command: S) -> Self {
        Self {
            transport: TransportConfig::Stdio {
                command: command.into(),
                args: vec![],
                env: vec![],
            },
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a builder for a server reached over streamable HTTP.
    #[inline]
    pub fn http<S: Into<String>>(url: S) -> Self {
        Self {
            transport: TransportConfig::Http {
                url: url.into(),
                bearer_token: None,
            },
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Appends arguments to the subprocess command. Ignored for HTTP.
    pub fn with_args<I, S>(mut self, new_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let TransportConfig::Stdio { args, .. } = &mut self.transport {
            args.extend(new_args.into_iter().map(Into::into));
        }
        self
    }

    /// Sets an environment variable for the subprocess. Ignored for HTTP.
    pub fn with_env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        if let TransportConfig::Stdio { env, .. } = &mut self.transport {
            env.push((key.into(), value.into()));
        }
        self
    }

    /// Sets the bearer token sent with every request. Ignored for stdio.
    pub fn with_bearer_token<S: Into<String>>(mut self, token: S) -> Self {
        if let TransportConfig::Http { bearer_token, .. } = &mut self.transport
        {
            *bearer_token = Some(token.into());
        }
        self
    }

    /// Sets the timeout of a single request.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> McpConfig {
        McpConfig {
            transport: self.transport,
            timeout: self.timeout,
        }
    }
}

/// Configuration for connecting to an MCP server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct McpConfig {
    pub(crate) transport: TransportConfig,
    pub(crate) timeout: Duration,
}

impl McpConfig {
    /// Returns how the server is reached.
    #[inline]
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Returns the timeout of a single request.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A label for the server before its own name is known.
    pub(crate) fn label(&self) -> String {
        match &self.transport {
            TransportConfig::Stdio { command, .. } => command.clone(),
            TransportConfig::Http { url, .. } => url.clone(),
        }
    }
}
