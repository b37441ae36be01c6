//! Shotline CLI: prepares lighting files for individual shots.
//!
//! Usage:
//!   shotline script [OPTIONS] <MASTER> <ANIMATION> <OUTPUT> [RANGE_CSV]
//!   shotline apply [OPTIONS] <SCENE> <LIBRARY> <OUTPUT> [RANGE_CSV]
//!   shotline paths <FILE>
//!   shotline range <CSV> <SHOT_KEY>

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use shotline_common::config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "shotline",
    about = "Per-shot lighting file setup: buckets, compositor graph, render outputs",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/shotline/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the commands that run the setup.
#[derive(clap::Args)]
struct SetupFlags {
    /// Skip the holdout step
    #[arg(long)]
    no_holdout: bool,

    /// Never link the transparent pass by socket position
    #[arg(long)]
    no_positional_fallback: bool,
}

impl SetupFlags {
    fn apply_to(&self, config: &mut AppConfig) {
        if self.no_holdout {
            config.compositor.holdout = false;
        }
        if self.no_positional_fallback {
            config.compositor.positional_fallback = None;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the host script that sets up one shot
    Script {
        /// Write the script here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        flags: SetupFlags,

        /// Lighting master file
        master: PathBuf,

        /// Animation file to link collections from
        animation: PathBuf,

        /// Where the prepared file is saved
        output: PathBuf,

        /// Shot range table (CSV: ep,sq,sh,start,end)
        range_csv: Option<PathBuf>,
    },

    /// Run the setup against JSON scene documents
    Apply {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        flags: SetupFlags,

        /// Scene document to start from
        scene: PathBuf,

        /// Library document to link collections from
        library: PathBuf,

        /// Where the prepared scene document is saved
        output: PathBuf,

        /// Shot range table (CSV: ep,sq,sh,start,end)
        range_csv: Option<PathBuf>,
    },

    /// Show the shot identity and render output paths for a file
    Paths {
        /// Shot file name or path
        file: PathBuf,

        /// Also show the shot's working directory in this department
        #[arg(long, value_name = "DIVISION")]
        division: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up a shot's frame range
    Range {
        /// Shot range table (CSV: ep,sq,sh,start,end)
        csv: PathBuf,

        /// Shot key, e.g. ep001_sq0001_sh0010
        shot_key: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    shotline_common::logging::init_logging(&LoggingConfig {
        level,
        json: config.logging.json,
    });
    match &cli.config {
        Some(path) => tracing::debug!(path = %path.display(), "Using config file"),
        None => tracing::debug!("Using default config location"),
    }

    match cli.command {
        Commands::Script {
            out,
            flags,
            master,
            animation,
            output,
            range_csv,
        } => {
            flags.apply_to(&mut config);
            commands::script::run(&config, master, animation, output, range_csv, out)
        }
        Commands::Apply {
            json,
            flags,
            scene,
            library,
            output,
            range_csv,
        } => {
            flags.apply_to(&mut config);
            commands::apply::run(&config, scene, library, output, range_csv, json)
        }
        Commands::Paths {
            file,
            division,
            json,
        } => commands::paths::run(&config, file, division, json),
        Commands::Range { csv, shot_key } => commands::range::run(csv, shot_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_script_positionals_and_flags() {
        let cli = Cli::try_parse_from([
            "shotline",
            "script",
            "--no-holdout",
            "--out",
            "setup.py",
            "--",
            "master.blend",
            "anim.blend",
            "out.blend",
        ])
        .unwrap();
        let Commands::Script {
            out,
            flags,
            range_csv,
            ..
        } = cli.command
        else {
            panic!("expected script command");
        };
        assert_eq!(out, Some(PathBuf::from("setup.py")));
        assert!(flags.no_holdout);
        assert!(!flags.no_positional_fallback);
        assert!(range_csv.is_none());
    }

    #[test]
    fn test_missing_positionals_are_usage_errors() {
        assert!(Cli::try_parse_from(["shotline", "script", "master.blend"]).is_err());
        assert!(Cli::try_parse_from(["shotline", "range", "ranges.csv"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = AppConfig::default();
        SetupFlags {
            no_holdout: true,
            no_positional_fallback: true,
        }
        .apply_to(&mut config);
        assert!(!config.compositor.holdout);
        assert!(config.compositor.positional_fallback.is_none());
    }
}
