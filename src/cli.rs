//! Command line interface of cloudferry, built on clap.
//!
//! [`Cli`] carries the global flags (`--config`, `--verbose`) and one
//! [`Command`] per trigger or front-end operation.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::state_machine::{JobStatus, TakeoutFile};

/// cloudferry: move data between clouds and track each job to completion.
#[derive(Debug, Parser)]
#[command(name = "cloudferry", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./cloudferry.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Job kind accepted by `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobTypeArg {
    Transfer,
    Takeout,
}

impl JobTypeArg {
    pub fn as_str(self) -> &'static str {
        match self {
            JobTypeArg::Transfer => "transfer",
            JobTypeArg::Takeout => "takeout",
        }
    }
}

/// Status filter for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Created,
    InProgress,
    Success,
    Failed,
}

impl From<StatusArg> for JobStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Created => JobStatus::Created,
            StatusArg::InProgress => JobStatus::InProgress,
            StatusArg::Success => JobStatus::Success,
            StatusArg::Failed => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a new job record and dispatch it.
    Create {
        /// Display name of the job.
        #[arg(long)]
        name: String,

        #[arg(long = "type", value_enum)]
        job_type: JobTypeArg,

        /// Source provider: gcloud, aws, azure, dropbox, gdrive or odrive.
        #[arg(long)]
        source: String,

        /// Source bucket (gcloud, aws) or storage account (azure).
        #[arg(long)]
        source_name: Option<String>,

        #[arg(long)]
        access_key_id: Option<String>,

        #[arg(long)]
        secret_access_key: Option<String>,

        /// Azure container.
        #[arg(long)]
        container: Option<String>,

        /// Azure SAS token.
        #[arg(long)]
        sas_token: Option<String>,

        /// Takeout file as `LINK` or `NAME=LINK`. Repeatable.
        #[arg(long = "file", value_name = "FILE")]
        files: Vec<String>,

        #[arg(long)]
        owner: Option<String>,

        /// Only write the record, do not dispatch it.
        #[arg(long, default_value_t = false)]
        no_dispatch: bool,
    },

    /// Dispatch an existing job (the creation trigger).
    Dispatch {
        id: String,
    },

    /// Apply a transfer completion notification read from a file or stdin.
    Notify {
        /// Read the payload from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Re-sign the artifacts of a finished job.
    Resolve {
        id: String,
    },

    /// Print one job.
    Show {
        id: String,

        /// Print the raw JSON record.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List jobs, oldest first.
    List {
        #[arg(long)]
        owner: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Delete a job record.
    Delete {
        id: String,
    },

    /// Print the destination bucket name of a job id.
    BucketName {
        id: String,
    },
}

/// Turn a `--file` value into a takeout file.
///
/// `NAME=LINK` sets the object name explicitly. A bare link keeps its own
/// `=` characters (query strings), so the split only happens when the part
/// before the first `=` is not itself a URL.
pub fn parse_file_arg(raw: &str) -> TakeoutFile {
    match raw.split_once('=') {
        Some((name, link)) if !name.is_empty() && !name.contains("://") => TakeoutFile {
            name: Some(name.to_string()),
            link: link.to_string(),
        },
        _ => TakeoutFile {
            name: None,
            link: raw.to_string(),
        },
    }
}
