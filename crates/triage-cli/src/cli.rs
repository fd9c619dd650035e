use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use triage_engine::JobType;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Pull helpdesk tickets and classify them with a generative model", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that take precedence over config.toml for this run only
#[derive(Args, Default)]
pub struct Overrides {
    /// Helpdesk domain, e.g. acme.freshservice.com
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Helpdesk API key
    #[arg(long, global = true, env = "TRIAGE_HELPDESK_API_KEY", hide_env_values = true)]
    pub helpdesk_key: Option<String>,

    /// AI API key
    #[arg(long, global = true, env = "TRIAGE_AI_API_KEY", hide_env_values = true)]
    pub ai_key: Option<String>,

    /// Model to send prompts to
    #[arg(long, global = true, env = "TRIAGE_MODEL")]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Print a [schema] section built from one real ticket
    Fields {
        /// Ticket to sample
        ticket_id: String,

        /// Also list the helpdesk's ticket form fields
        #[arg(long)]
        form_fields: bool,
    },

    /// List helpdesk departments
    Departments,

    /// List models that can generate content
    Models,

    /// Fetch the tickets listed in a spreadsheet or CSV
    Fetch {
        /// .xlsx, .xls, .ods, .csv or .txt file
        input: PathBuf,

        /// Column holding the ticket IDs
        #[arg(long, default_value = "Ticket ID")]
        column: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Classify fetched tickets or write a bulk report
    Analyze {
        #[command(flatten)]
        prompt: PromptArgs,

        /// tickets.json written by `triage fetch`
        #[arg(long, default_value = "tickets.json")]
        tickets: PathBuf,

        /// Job type (defaults to the saved prompt's, else per-ticket)
        #[arg(long, value_enum)]
        job: Option<JobArg>,

        /// File to upload and attach to a bulk request
        #[arg(long)]
        attach: Option<PathBuf>,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Estimate tokens and cost of a bulk request
    Estimate {
        #[command(flatten)]
        prompt: PromptArgs,

        #[arg(long, default_value = "tickets.json")]
        tickets: PathBuf,
    },

    /// Split a model answer saved to a file into report.md and section CSVs
    Report {
        /// Text file holding the model's answer
        input: PathBuf,

        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Manage saved prompts
    #[command(subcommand)]
    Prompts(PromptCommands),

    /// Serve the prompt library over HTTP
    Serve {
        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct PromptArgs {
    /// Prompt text
    #[arg(long)]
    pub prompt: Option<String>,

    /// Saved prompt from the library
    #[arg(long)]
    pub prompt_file: Option<String>,
}

#[derive(Subcommand)]
pub enum PromptCommands {
    /// List saved prompts
    List,

    /// Print a saved prompt
    Show { name: String },

    /// Save a prompt from text or a file
    Save {
        name: String,

        /// Prompt text
        #[arg(long, conflicts_with = "from")]
        text: Option<String>,

        /// Read the prompt text from a file
        #[arg(long)]
        from: Option<PathBuf>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, value_enum)]
        job: Option<JobArg>,
    },

    /// Delete a saved prompt
    Delete { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum JobArg {
    PerTicket,
    Bulk,
}

impl From<JobArg> for JobType {
    fn from(job: JobArg) -> Self {
        match job {
            JobArg::PerTicket => JobType::PerTicket,
            JobArg::Bulk => JobType::Bulk,
        }
    }
}

impl JobArg {
    pub fn as_str(self) -> &'static str {
        match self {
            JobArg::PerTicket => "per_ticket",
            JobArg::Bulk => "bulk",
        }
    }
}
