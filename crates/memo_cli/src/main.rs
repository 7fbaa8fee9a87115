//! Memo CLI — inspects and maintains memoization cache directories.
//!
//! Provides `memo hash` for computing the signature a set of arguments would
//! get, `memo ls` for listing cache entries, `memo show` for decoding one
//! entry and `memo purge` for deleting entries.

#![warn(missing_docs)]

mod hash;
mod ls;
mod purge;
mod show;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use memo_config::MemoConfig;
use tracing_subscriber::EnvFilter;

/// Memo — disk cache tooling.
#[derive(Parser, Debug)]
#[command(name = "memo", version, about = "Memoization cache tooling")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `memo.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the content hash and file-name signature of a JSON value.
    Hash(HashArgs),
    /// List cache entries in a directory.
    Ls(LsArgs),
    /// Decode a cache entry and print it as JSON.
    Show(ShowArgs),
    /// Delete cache entries.
    Purge(PurgeArgs),
}

/// Arguments for the `memo hash` subcommand.
#[derive(Parser, Debug)]
pub struct HashArgs {
    /// JSON text to hash, e.g. `'{"args": [], "kwargs": {"q": "rust"}}'`.
    pub json: String,
}

/// Arguments for the `memo ls` subcommand.
#[derive(Parser, Debug)]
pub struct LsArgs {
    /// Cache directory (default: `cache.dir` from `memo.toml`).
    pub dir: Option<String>,

    /// Only list entries of this function identity.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Only list entries of `--name` written with this cache comment.
    #[arg(long, requires = "name")]
    pub comment: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `memo show` subcommand.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Path to a `*.cache.*` file.
    pub file: String,
}

/// Arguments for the `memo purge` subcommand.
#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Cache directory (default: `cache.dir` from `memo.toml`).
    pub dir: Option<String>,

    /// Only delete entries of this function identity.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Only delete entries of `--name` written with this cache comment.
    #[arg(long, requires = "name")]
    pub comment: Option<String>,

    /// List what would be deleted without deleting it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Listing output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Hash(ref args) => hash::run(args),
        Command::Ls(ref args) => ls::run(args, &global),
        Command::Show(ref args) => show::run(args),
        Command::Purge(ref args) => purge::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(global: &GlobalArgs) {
    let level = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads `--config`, or `memo.toml` in the working directory if present.
fn load_config(global: &GlobalArgs) -> Result<MemoConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &global.config {
        return Ok(memo_config::load_config_file(Path::new(path))?);
    }
    let cwd = std::env::current_dir()?;
    if cwd.join(memo_config::CONFIG_FILE).is_file() {
        Ok(memo_config::load_config(&cwd)?)
    } else {
        Ok(MemoConfig::default())
    }
}

/// Resolves the cache directory from the argument or the configuration.
pub(crate) fn cache_dir(
    dir: Option<&str>,
    global: &GlobalArgs,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(dir) = dir {
        return Ok(PathBuf::from(dir));
    }
    let config = load_config(global)?;
    match config.cache.dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Err(format!(
            "no cache directory given and none configured in {}",
            memo_config::CONFIG_FILE
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn global_with(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: false,
            verbose: false,
            config,
        }
    }

    #[test]
    fn parse_hash() {
        let cli = Cli::parse_from(["memo", "hash", "[1, 2, 3]"]);
        match cli.command {
            Command::Hash(ref args) => assert_eq!(args.json, "[1, 2, 3]"),
            _ => panic!("expected Hash command"),
        }
    }

    #[test]
    fn parse_ls_default() {
        let cli = Cli::parse_from(["memo", "ls"]);
        match cli.command {
            Command::Ls(ref args) => {
                assert!(args.dir.is_none());
                assert!(args.name.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Ls command"),
        }
    }

    #[test]
    fn parse_ls_with_args() {
        let cli = Cli::parse_from(["memo", "ls", "/tmp/cache", "--name", "search", "-f", "json"]);
        match cli.command {
            Command::Ls(ref args) => {
                assert_eq!(args.dir.as_deref(), Some("/tmp/cache"));
                assert_eq!(args.name.as_deref(), Some("search"));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Ls command"),
        }
    }

    #[test]
    fn parse_show() {
        let cli = Cli::parse_from(["memo", "show", "c/search.cache.json.gz"]);
        match cli.command {
            Command::Show(ref args) => assert_eq!(args.file, "c/search.cache.json.gz"),
            _ => panic!("expected Show command"),
        }
    }

    #[test]
    fn parse_purge() {
        let cli = Cli::parse_from(["memo", "purge", "--name", "search", "--dry-run"]);
        match cli.command {
            Command::Purge(ref args) => {
                assert!(args.dir.is_none());
                assert_eq!(args.name.as_deref(), Some("search"));
                assert!(args.comment.is_none());
                assert!(args.dry_run);
            }
            _ => panic!("expected Purge command"),
        }
    }

    #[test]
    fn comment_filter_requires_name() {
        let cli = Cli::parse_from(["memo", "purge", "--name", "search", "--comment", "v2"]);
        match cli.command {
            Command::Purge(ref args) => assert_eq!(args.comment.as_deref(), Some("v2")),
            _ => panic!("expected Purge command"),
        }
        assert!(Cli::try_parse_from(["memo", "ls", "--comment", "v2"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["memo", "--quiet", "--config", "/etc/memo.toml", "ls"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("/etc/memo.toml"));
    }

    #[test]
    fn parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["memo", "purge", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    fn explicit_dir_wins() {
        let dir = cache_dir(Some("here"), &global_with(Some("/nonexistent.toml".into()))).unwrap();
        assert_eq!(dir, PathBuf::from("here"));
    }

    #[test]
    fn dir_from_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("memo.toml");
        std::fs::write(&path, "[cache]\ndir = \"/var/cache/memo\"\n").unwrap();
        let global = global_with(Some(path.to_string_lossy().into_owned()));
        assert_eq!(cache_dir(None, &global).unwrap(), PathBuf::from("/var/cache/memo"));
    }

    #[test]
    fn config_without_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("memo.toml");
        std::fs::write(&path, "[cache]\nformat = \"json\"\n").unwrap();
        let global = global_with(Some(path.to_string_lossy().into_owned()));
        let err = cache_dir(None, &global).unwrap_err();
        assert!(err.to_string().contains("no cache directory"));
    }
}
