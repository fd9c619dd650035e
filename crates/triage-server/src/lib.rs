pub mod server;

pub use server::PromptServer;
