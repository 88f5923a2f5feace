use std::time::Duration;

use baton::mcp::{McpConfig, McpConfigBuilder};
use clap::Parser;
use serde_json::{Map, Value};

/// Lists the tools an MCP server serves and optionally calls one.
#[derive(Parser, Debug)]
#[command(name = "baton", version, long_about = None)]
pub struct Cli {
    /// Streamable HTTP endpoint to connect to instead of spawning a command
    #[arg(long, env = "BATON_MCP_URL", conflicts_with = "command")]
    pub url: Option<String>,

    /// Bearer token sent to the HTTP endpoint
    #[arg(long, env = "BATON_MCP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "BATON_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Name of a tool to call after listing
    #[arg(long, env = "BATON_CALL_TOOL", value_name = "TOOL")]
    pub call: Option<String>,

    /// JSON object of arguments for the called tool
    #[arg(
        long,
        env = "BATON_CALL_ARGS",
        value_name = "JSON",
        value_parser = parse_arguments,
        requires = "call"
    )]
    pub args: Option<Map<String, Value>>,

    /// Server command and its arguments
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "url"
    )]
    pub command: Vec<String>,
}

/// A tool to call once the tools are listed.
#[derive(Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl Cli {
    /// Splits the options into the server configuration and the call.
    pub fn into_parts(self) -> (McpConfig, Option<ToolCall>) {
        let mut builder = match self.url {
            Some(url) => {
                let builder = McpConfigBuilder::http(url);
                match self.token {
                    Some(token) => builder.with_bearer_token(token),
                    None => builder,
                }
            }
            None => {
                let mut command = self.command.into_iter();
                let program = command.next().unwrap_or_default();
                McpConfigBuilder::stdio(program).with_args(command)
            }
        };
        if let Some(secs) = self.timeout {
            builder = builder.with_timeout(Duration::from_secs(secs));
        }

        let call = self.call.map(|name| ToolCall {
            name,
            arguments: self.args.unwrap_or_default(),
        });
        (builder.build(), call)
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(_) => Err("expected a JSON object".to_owned()),
        Err(err) => Err(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use baton::mcp::TransportConfig;
    use serde_json::json;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let argv = std::iter::once("baton").chain(args.iter().copied());
        Cli::try_parse_from(argv)
    }

    #[test]
    fn test_command_keeps_its_flags() {
        let cli = parse(&[
            "--timeout",
            "5",
            "npx",
            "-y",
            "@modelcontextprotocol/server-everything",
        ])
        .unwrap();
        let (config, call) = cli.into_parts();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(call, None);
        let TransportConfig::Stdio { command, args, .. } = config.transport()
        else {
            panic!("expected stdio");
        };
        assert_eq!(command, "npx");
        assert_eq!(args, &["-y", "@modelcontextprotocol/server-everything"]);
    }

    #[test]
    fn test_url_and_call() {
        let cli = parse(&[
            "--url",
            "http://localhost:3001/mcp",
            "--token",
            "secret",
            "--call",
            "echo",
            "--args",
            r#"{"message":"hi"}"#,
        ])
        .unwrap();
        let (config, call) = cli.into_parts();
        assert_eq!(
            *config.transport(),
            TransportConfig::Http {
                url: "http://localhost:3001/mcp".to_owned(),
                bearer_token: Some("secret".to_owned()),
            }
        );
        let call = call.unwrap();
        assert_eq!(call.name, "echo");
        assert_eq!(Value::Object(call.arguments), json!({ "message": "hi" }));
    }

    #[test]
    fn test_invalid_options() {
        // Neither a command nor a URL.
        assert!(parse(&[]).is_err());
        // Arguments must be an object and need a tool.
        assert!(parse(&["--call", "echo", "--args", "[1]", "srv"]).is_err());
        assert!(parse(&["--args", "{}", "srv"]).is_err());
        assert!(parse(&["--timeout", "soon", "srv"]).is_err());
    }
}
