use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "paxtract",
    about = "Queue, download and remux episodes of a series into a local library",
    version,
    author
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (JSON)
    #[arg(short, long, global = true, env = "PAXTRACT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter directive, e.g. "paxtract=debug"
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// Write daily log files into this folder
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract episodes of the series described by a manifest
    Extract {
        /// JSON catalog of the series
        #[arg(short, long)]
        manifest: PathBuf,

        /// Episode intervals, e.g. "1-3,5,8:9"
        #[arg(short, long)]
        episodes: String,

        /// Preferred audio track
        #[arg(short, long)]
        audio: Option<String>,

        /// Preferred quality (vertical resolution)
        #[arg(short, long)]
        quality: Option<u32>,

        /// Library folder; overrides the configuration
        #[arg(short, long)]
        library: Option<PathBuf>,
    },

    /// Show the audio tracks and qualities a series offers
    Options {
        /// JSON catalog of the series
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extract() {
        let args = Args::try_parse_from([
            "paxtract", "extract", "-m", "show.json", "-e", "1-3,5", "--quality", "720",
        ])
        .unwrap();
        match args.command {
            Commands::Extract {
                manifest,
                episodes,
                audio,
                quality,
                library,
            } => {
                assert_eq!(manifest, PathBuf::from("show.json"));
                assert_eq!(episodes, "1-3,5");
                assert_eq!(audio, None);
                assert_eq!(quality, Some(720));
                assert_eq!(library, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["paxtract", "options", "-m", "show.json", "--log", "debug"])
                .unwrap();
        assert_eq!(args.log.as_deref(), Some("debug"));
        assert!(matches!(args.command, Commands::Options { .. }));
    }
}
