//! Command-line argument parsing for apprepo
//!
//! This module defines the CLI structure using clap derive macros, covering
//! application listing, download, repository inspection, uploads and
//! destination management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// apprepo - Work with application files in a repository service
#[derive(Parser, Debug)]
#[command(
    name = "apprepo",
    version,
    about = "List, download and upload application files of a repository service",
    long_about = "A command-line client for tenant-scoped application-file repositories.
Resolves service instances and keys on demand, downloads files concurrently,
and manages destination configurations."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List applications, or the files of one application
    List(ListArgs),

    /// Download all files of an application
    Get(GetArgs),

    /// Show repository metadata for app-host instances
    Info(InfoArgs),

    /// Upload application archives to an app-host instance
    Push(PushArgs),

    /// Delete app-host instances, or only the content they serve
    Delete(DeleteArgs),

    /// Manage destination configurations
    Destinations(DestinationsArgs),
}

/// Arguments for the list command
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Application key ("NAME" or "NAME-VERSION"); lists files of that
    /// application instead of all applications
    pub app: Option<String>,

    /// Scope the listing to one app-host instance
    #[arg(long, value_name = "GUID")]
    pub app_host: Option<String>,
}

/// Arguments for the get command
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Application key ("NAME" or "NAME-VERSION")
    pub app: String,

    /// Directory to write downloaded files into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    /// Scope the download to one app-host instance
    #[arg(long, value_name = "GUID")]
    pub app_host: Option<String>,
}

/// Arguments for the info command
#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// App-host instance GUIDs to inspect
    #[arg(long = "app-host", value_name = "GUID")]
    pub app_hosts: Vec<String>,
}

/// Arguments for the push command
#[derive(Args, Debug, Clone)]
pub struct PushArgs {
    /// Prepared zip archives to upload
    #[arg(required = true, value_name = "ZIP")]
    pub archives: Vec<PathBuf>,

    /// Name of an existing app-host instance to upload into; a new
    /// instance is provisioned when omitted
    #[arg(long, value_name = "NAME")]
    pub app_host_name: Option<String>,
}

/// Arguments for the delete command
#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// App-host instance GUIDs to delete
    #[arg(value_name = "GUID")]
    pub app_hosts: Vec<String>,

    /// App-host instance names to delete; a trailing '*' matches by prefix
    #[arg(long = "name", short = 'n', value_name = "NAME")]
    pub names: Vec<String>,

    /// Delete uploaded content only, keeping the instances
    #[arg(long, conflicts_with = "destination")]
    pub content: bool,

    /// Also delete destinations that point to the deleted instances
    #[arg(long, short = 'd')]
    pub destination: bool,
}

/// Arguments for destination management
#[derive(Args, Debug)]
pub struct DestinationsArgs {
    #[command(subcommand)]
    pub action: DestinationsAction,

    /// Pin an existing destination service instance by name and manage
    /// instance-level records instead of subaccount-level ones
    #[arg(long, global = true, value_name = "NAME")]
    pub instance: Option<String>,
}

/// Destination subcommands
#[derive(Subcommand, Debug)]
pub enum DestinationsAction {
    /// List destination records
    List,

    /// Create a destination record
    Create(CreateDestinationArgs),

    /// Delete a destination record by name
    Delete {
        /// Destination name
        name: String,
    },
}

/// Arguments for creating a destination
#[derive(Args, Debug, Clone)]
pub struct CreateDestinationArgs {
    /// Destination name
    pub name: String,

    /// Target URL
    #[arg(long)]
    pub url: String,

    /// Destination type
    #[arg(long = "type", default_value = "HTTP")]
    pub destination_type: String,

    /// Authentication scheme
    #[arg(long, default_value = "NoAuthentication")]
    pub authentication: String,

    /// Proxy type
    #[arg(long, default_value = "Internet")]
    pub proxy_type: String,

    /// Additional configuration properties as KEY=VALUE pairs
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl CreateDestinationArgs {
    /// Split the raw KEY=VALUE parameters into pairs
    pub fn extra_properties(&self) -> Result<Vec<(String, String)>, String> {
        self.params
            .iter()
            .map(|raw| {
                raw.split_once('=')
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .ok_or_else(|| format!("Invalid property '{raw}', expected KEY=VALUE"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_list_with_app_host() {
        let cli = Cli::try_parse_from(["apprepo", "list", "shop-1.0.0", "--app-host", "guid-1"])
            .unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.app.as_deref(), Some("shop-1.0.0"));
                assert_eq!(args.app_host.as_deref(), Some("guid-1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn push_requires_at_least_one_archive() {
        assert!(Cli::try_parse_from(["apprepo", "push"]).is_err());
    }

    #[test]
    fn delete_parses_guids_names_and_flags() {
        let cli = Cli::try_parse_from([
            "apprepo",
            "delete",
            "guid-1",
            "--name",
            "shop*",
            "--destination",
        ])
        .unwrap();
        match cli.command {
            Commands::Delete(args) => {
                assert_eq!(args.app_hosts, vec!["guid-1"]);
                assert_eq!(args.names, vec!["shop*"]);
                assert!(args.destination);
                assert!(!args.content);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn delete_content_excludes_destination_cleanup() {
        assert!(Cli::try_parse_from([
            "apprepo",
            "delete",
            "guid-1",
            "--content",
            "--destination"
        ])
        .is_err());
    }

    #[test]
    fn destination_params_must_be_pairs() {
        let cli = Cli::try_parse_from([
            "apprepo",
            "destinations",
            "create",
            "backend",
            "--url",
            "https://api.example.com",
            "--param",
            "forwardAuthToken=true",
        ])
        .unwrap();
        match cli.command {
            Commands::Destinations(args) => match args.action {
                DestinationsAction::Create(create) => {
                    let extras = create.extra_properties().unwrap();
                    assert_eq!(
                        extras,
                        vec![("forwardAuthToken".to_string(), "true".to_string())]
                    );
                }
                other => panic!("unexpected action: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbosity_maps_to_levels() {
        let cli = Cli::try_parse_from(["apprepo", "--verbose", "list"]).unwrap();
        assert_eq!(cli.log_level(), tracing::Level::INFO);
        let cli = Cli::try_parse_from(["apprepo", "--quiet", "list"]).unwrap();
        assert_eq!(cli.log_level(), tracing::Level::ERROR);
    }
}
