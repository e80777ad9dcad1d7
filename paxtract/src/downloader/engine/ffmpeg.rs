//! FFmpeg remux engine.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

use super::Muxer;
use super::utils::ffmpeg_parser::{parse_duration, parse_time_field, progress_fraction};
use crate::{Error, Result};

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Path or name of the ffmpeg binary.
    pub binary_path: String,
    /// Extra arguments placed before `-i`.
    pub input_args: Vec<String>,
    /// Extra arguments placed before the output path.
    pub output_args: Vec<String>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_owned(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }
}

/// Remuxes the local playlist with ffmpeg, copying streams into an mp4 container.
pub struct FfmpegMuxer {
    config: FfmpegConfig,
}

impl FfmpegMuxer {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, playlist: &Path, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_owned(), "-hide_banner".to_owned()];

        // segment files carry no extension, the key file neither
        args.extend(["-allowed_extensions".to_owned(), "ALL".to_owned()]);
        args.extend(self.config.input_args.iter().cloned());
        args.extend(["-i".to_owned(), playlist.to_string_lossy().into_owned()]);

        args.extend(["-c:v".to_owned(), "copy".to_owned()]);
        args.extend(["-c:a".to_owned(), "copy".to_owned()]);
        args.extend(self.config.output_args.iter().cloned());
        args.extend(["-f".to_owned(), "mp4".to_owned()]);
        args.push(output.to_string_lossy().into_owned());

        args
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new(FfmpegConfig::default())
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(
        &self,
        playlist: &Path,
        key: &Path,
        output: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()> {
        let args = self.build_args(playlist, output);
        info!(
            output = %output.display(),
            encrypted = key.exists(),
            "Starting remux"
        );
        debug!(?args, "ffmpeg arguments");

        let mut child = Command::new(&self.config.binary_path)
            .args(&args)
            .env("LC_ALL", "C") // Force consistent output
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::mux(format!("failed to spawn {}: {e}", self.config.binary_path)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::mux("failed to capture ffmpeg stderr"))?;

        // progress lines end in '\r', everything else in '\n'
        let mut chunks = BufReader::new(stderr).split(b'\r');
        let mut duration = None;
        let mut tail = VecDeque::with_capacity(STDERR_TAIL);

        while let Some(chunk) = chunks.next_segment().await? {
            let text = String::from_utf8_lossy(&chunk);
            for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
                trace!(line, "ffmpeg");

                if duration.is_none() {
                    duration = parse_duration(line);
                }
                if let Some(fraction) =
                    parse_time_field(line).and_then(|elapsed| progress_fraction(elapsed, duration))
                {
                    on_progress(fraction);
                }

                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line.to_owned());
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let detail = tail.back().cloned().unwrap_or_default();
            warn!(%status, detail = %detail, "ffmpeg failed");
            return Err(Error::mux(format!("ffmpeg exited with {status}: {detail}")));
        }

        debug!(output = %output.display(), "Remux finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn args_copy_streams_into_mp4() {
        let muxer = FfmpegMuxer::default();
        let args = muxer.build_args(&PathBuf::from("/lib/show/.data/3/.m3u8"), &PathBuf::from("/lib/show/3.mp4"));

        let position = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[position("-allowed_extensions") + 1], "ALL");
        assert!(position("-allowed_extensions") < position("-i"));
        assert_eq!(args[position("-i") + 1], "/lib/show/.data/3/.m3u8");
        assert_eq!(args[position("-c:v") + 1], "copy");
        assert_eq!(args[position("-c:a") + 1], "copy");
        assert_eq!(args[position("-f") + 1], "mp4");
        assert_eq!(args.last().unwrap(), "/lib/show/3.mp4");
    }

    #[test]
    fn extra_args_are_placed_around_input() {
        let muxer = FfmpegMuxer::new(FfmpegConfig {
            input_args: vec!["-loglevel".into(), "info".into()],
            output_args: vec!["-movflags".into(), "+faststart".into()],
            ..FfmpegConfig::default()
        });
        let args = muxer.build_args(Path::new("in.m3u8"), Path::new("out.mp4"));
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(args.iter().position(|a| a == "-loglevel").unwrap() < input);
        assert!(args.iter().position(|a| a == "-movflags").unwrap() > input);
    }

    #[tokio::test]
    async fn missing_binary_is_a_mux_error() {
        let muxer = FfmpegMuxer::new(FfmpegConfig {
            binary_path: "/nonexistent/ffmpeg-binary".into(),
            ..FfmpegConfig::default()
        });
        let err = muxer
            .mux(Path::new("a.m3u8"), Path::new("key"), Path::new("out.mp4"), &|_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Mux(_)));
    }
}
