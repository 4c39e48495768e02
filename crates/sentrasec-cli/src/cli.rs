use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "sentrasec", about = "Simulated operations console")]
pub struct Cli {
    /// TOML config file (defaults to ./sentrasec.toml when present)
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Sweep a subnet
    Recon(Recon),

    /// Focused scan of a single host
    Scan(Scan),

    /// Run one exploit
    Exploit(Exploit),

    /// Run several exploits one after another
    ExploitAll(ExploitAll),

    /// Crack the next encrypted credential in the vault
    Crack(Crack),

    /// Hijack a session and hold it until it winds down
    Session(Session),

    /// Show harvested credentials
    Vault(Vault),

    /// Show collected evidence, or export one item as text
    Evidence(Evidence),

    /// List scan policies, or record a manual run
    Policies(Policies),

    /// List integrations, or run a connection test
    Integrations(Integrations),
}

#[derive(Debug, Parser)]
pub struct Recon {
    /// Subnet in CIDR notation
    #[clap(default_value = "192.168.1.0/24")]
    pub subnet: String,
}

#[derive(Debug, Parser)]
pub struct Scan {
    pub ip: Ipv4Addr,
}

#[derive(Debug, Parser)]
pub struct Exploit {
    /// Exploit or CVE identifier
    pub id: String,
}

#[derive(Debug, Parser)]
pub struct ExploitAll {
    #[clap(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct Crack {}

#[derive(Debug, Parser)]
pub struct Session {
    /// Target host; a random lab host when omitted
    pub target: Option<String>,
}

#[derive(Debug, Parser)]
pub struct Vault {
    /// Filter by username, domain or source
    pub search: Option<String>,
}

#[derive(Debug, Parser)]
pub struct Evidence {
    /// Only items carrying this tag
    #[clap(long)]
    pub tag: Option<String>,

    /// Print the text export of this item
    #[clap(long)]
    pub export: Option<u64>,
}

#[derive(Debug, Parser)]
pub struct Policies {
    /// Policy to run now
    #[clap(long)]
    pub run: Option<u64>,
}

#[derive(Debug, Parser)]
pub struct Integrations {
    /// Integration to test
    #[clap(long)]
    pub test: Option<u64>,
}
