//! Command-line interface parsing for fintrack-offline.

use clap::{Parser, Subcommand};

/// Offline cache controller for the fintrack application shell
#[derive(Parser, Debug)]
#[command(name = "fintrack-offline")]
#[command(about = "Pre-cache the fintrack app shell and serve requests offline-first")]
#[command(version)]
pub struct Cli {
    /// Keep the cache in memory instead of the SQLite file from the config
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pre-cache the manifest into the current generation and activate
    Install,

    /// Run one request through the controller
    ///
    /// Examples:
    ///   fintrack-offline fetch http://localhost:8080/style.css
    ///   fintrack-offline fetch --navigate http://localhost:8080/
    Fetch {
        url: String,

        /// Treat the request as a top-level document load
        #[arg(long)]
        navigate: bool,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Write the response body to stdout instead of a JSON summary
        #[arg(long)]
        body: bool,
    },

    /// List keys stored in the current generation
    Keys,

    /// List all cache generations
    Generations,

    /// Discard one generation, or every generation but the current one
    Purge {
        #[arg(long)]
        generation: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from(["fintrack-offline", "install"]).unwrap();
        assert_eq!(cli.command, Command::Install);
        assert!(!cli.in_memory);
    }

    #[test]
    fn test_parse_fetch_defaults() {
        let cli = Cli::try_parse_from(["fintrack-offline", "fetch", "http://localhost:8080/"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Fetch { url: "http://localhost:8080/".into(), navigate: false, method: "GET".into(), body: false }
        );
    }

    #[test]
    fn test_parse_fetch_flags_and_global_in_memory() {
        let cli = Cli::try_parse_from([
            "fintrack-offline",
            "fetch",
            "--navigate",
            "--method",
            "POST",
            "http://localhost:8080/",
            "--in-memory",
        ])
        .unwrap();
        assert!(cli.in_memory);
        assert!(matches!(cli.command, Command::Fetch { navigate: true, ref method, .. } if method == "POST"));
    }

    #[test]
    fn test_parse_purge_generation() {
        let cli = Cli::try_parse_from(["fintrack-offline", "purge", "--generation", "finance-offline-v0"]).unwrap();
        assert_eq!(cli.command, Command::Purge { generation: Some("finance-offline-v0".into()) });
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Cli::try_parse_from(["fintrack-offline"]).is_err());
    }
}
