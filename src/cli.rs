use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal client for OpenAI-compatible chat endpoints")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single message and print the answer
    Ask {
        /// The message to send
        message: Vec<String>,

        /// Let the model call local tools while answering
        #[arg(long)]
        tools: bool,
    },

    /// Manage the configuration in ~/.parley/
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage stored markdown documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Manage saved conversation sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Create ~/.parley/ with a default configuration
    Init,
    /// Print the current endpoint, model and settings
    Show,
    /// Restore the default configuration
    Reset,
    /// Send a one-token request to the current endpoint
    Test,
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List saved sessions, newest first
    List,
    /// Print a session transcript
    Show { id: String },
    /// Delete a session
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum DocsAction {
    /// Store a document
    Add {
        /// Document title
        title: String,
        /// Read content from this file instead of stdin
        #[arg(long)]
        file: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List stored documents
    List,
    /// Print a document's content
    Show { id: String },
    /// Delete a document
    Remove { id: String },
    /// Search titles, tags and content
    Search { query: String },
}
