//! Command-line interface: serving the Control Plane, and a handful of
//! operator diagnostics that drive the Engine/Supervisor directly
//! without going through HTTP.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "wafleet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resume approved bots for every active tenant and serve the
    /// Control Plane until shutdown.
    Serve,

    /// Register a new bot from a wire-format session string.
    Register {
        bot_name: String,
        session_string: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        target_tenant: Option<String>,
    },

    /// Approve a pending bot for a duration in months (1-12).
    Approve { bot_id: Uuid, months: i32 },

    /// Migrate a bot to another tenant.
    Migrate {
        bot_id: Uuid,
        target_tenant: String,
    },

    /// Request a WhatsApp pairing code for a phone number.
    PairingCode { phone: String },

    /// Advisory diagnostic: checksum every container's credential file
    /// under the given root (defaults to the configured container
    /// directory). Never consulted by the Registration Engine.
    LegacyChecksum {
        #[arg(long)]
        root: Option<String>,
    },
}
