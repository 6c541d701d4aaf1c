#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use dotenv::dotenv;
use poem_mcpserver::McpServer;
use remote_shell_mcp::mcp::{ManagerConfig, McpShellCommands, RusshTransport, ShellManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let manager = Arc::new(ShellManager::new(
        Arc::new(RusshTransport),
        ManagerConfig::from_env(),
    ));

    let result =
        poem_mcpserver::stdio::stdio(McpServer::new().tools(McpShellCommands::new(manager.clone())))
            .await;

    manager.shutdown().await;
    result?;
    Ok(())
}
