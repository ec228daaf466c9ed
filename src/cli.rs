use clap::{Parser, Subcommand};

/// bellgate — token-gated remote bell controller
#[derive(Parser)]
#[command(name = "bellgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bell server
    Serve {
        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage ring tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Mint a new ring token
    Create {
        /// Ring duration in milliseconds
        #[arg(long, default_value = "1000")]
        duration_ms: u64,
        /// RFC 3339 instant before which the token cannot ring
        #[arg(long)]
        not_before: Option<String>,
        /// RFC 3339 instant after which the token cannot ring
        #[arg(long)]
        not_after: Option<String>,
        /// Keep the token reusable after each ring
        #[arg(long)]
        sticky: bool,
        /// Allow ringing without the admin key (machine callers)
        #[arg(long)]
        skip_verification: bool,
    },
    /// List tokens
    List,
    /// Delete a token
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Recreate the built-in sample tokens
    ResetSamples,
}
