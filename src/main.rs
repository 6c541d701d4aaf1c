#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use remote_shell_mcp::mcp::{ManagerConfig, McpShellCommands, RusshTransport, ShellManager};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let mcp_port: u16 = std::env::var("MCP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let mcp_addr = format!("0.0.0.0:{}", mcp_port);
    info!("Starting MCP server on {}", mcp_addr);

    let config = ManagerConfig::from_env();
    info!("Manager configuration: {:?}", config);
    let manager = Arc::new(ShellManager::new(Arc::new(RusshTransport), config));

    let tools_manager = manager.clone();
    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(McpShellCommands::new(tools_manager.clone()))
            }),
        )
        .with(Tracing);

    info!("Use ssh_connect to open a connection, ssh_session_start for independent sessions");

    Server::new(TcpListener::bind(mcp_addr))
        .name("Remote Shell MCP Server")
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
            },
            Some(Duration::from_secs(5)),
        )
        .await?;

    manager.shutdown().await;
    Ok(())
}
