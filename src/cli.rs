use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::db::IdentityRecord;

#[derive(Debug, Parser)]
#[command(name = "sql-identity-resolver", version, about = "Resolve bearer tokens to user ids over SQL")]
pub struct Cli {
    /// YAML configuration file; `config.yaml` is used when present.
    #[arg(long, short, env = "CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP endpoints.
    Serve,
    /// Create the identities table and load rows into it.
    Provision {
        /// Seed the well-known fixture identity.
        #[arg(long)]
        fixture: bool,
        /// Extra identity to seed; may be repeated.
        #[arg(long = "seed", value_name = "TOKEN:USERID")]
        seeds: Vec<IdentityRecord>,
    },
    /// Drop the identities table.
    Teardown,
    /// Resolve one token and print the outcome.
    Resolve { token: String },
}

impl Commands {
    /// Rows a `provision` run should insert.
    pub fn seed_records(fixture: bool, seeds: &[IdentityRecord]) -> Vec<IdentityRecord> {
        let mut records = Vec::with_capacity(seeds.len() + 1);
        if fixture {
            records.push(IdentityRecord::fixture());
        }
        records.extend(seeds.iter().cloned());
        records
    }
}
