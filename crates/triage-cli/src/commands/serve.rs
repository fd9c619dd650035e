use anyhow::Result;
use triage_config::Config;
use triage_server::PromptServer;

use super::prompt_library;

pub async fn handle(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let library = prompt_library(config).await?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    println!("Serving prompts from {}", library.root().display());
    println!("  http://{}:{}/list-prompts", host, port);

    PromptServer::serve(library, &host, port).await
}
