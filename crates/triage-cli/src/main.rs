mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use triage_config::Config;

use cli::{Commands, PromptCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    if let Commands::Init { force } = cli.command {
        return commands::init::handle(force);
    }

    let mut config = Config::load()?;
    commands::apply_overrides(&mut config, &cli.overrides);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Fields {
            ticket_id,
            form_fields,
        } => commands::fields::handle(&config, &ticket_id, form_fields).await,
        Commands::Departments => commands::departments::handle(&config).await,
        Commands::Models => commands::models::handle(&config).await,
        Commands::Fetch { input, column, out } => {
            commands::fetch::handle(&config, &input, &column, &out).await
        }
        Commands::Analyze {
            prompt,
            tickets,
            job,
            attach,
            out,
        } => {
            commands::analyze::handle(&config, &prompt, &tickets, job, attach.as_deref(), &out)
                .await
        }
        Commands::Estimate { prompt, tickets } => {
            commands::analyze::estimate(&config, &prompt, &tickets).await
        }
        Commands::Report { input, out } => commands::report::handle(&config, &input, &out),
        Commands::Prompts(cmd) => match cmd {
            PromptCommands::List => commands::prompts::list(&config).await,
            PromptCommands::Show { name } => commands::prompts::show(&config, &name).await,
            PromptCommands::Save {
                name,
                text,
                from,
                title,
                job,
            } => commands::prompts::save(&config, &name, text, from.as_deref(), title, job).await,
            PromptCommands::Delete { name } => commands::prompts::delete(&config, &name).await,
        },
        Commands::Serve { port, host } => commands::serve::handle(&config, host, port).await,
    }
}
