use regex::Regex;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::config::EncoderSettings;
use crate::error::ProcessingError;

/// Probe and encode operations the file processor relies on
pub trait MediaTools: Send + Sync {
    /// Codec name of the first video stream, `None` when the file has no video stream
    fn probe_video_codec(&self, input: &Path) -> Result<Option<String>, ProcessingError>;

    /// Re-encode `input` into `output`, overwriting `output`
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), ProcessingError>;
}

/// Decides from a probed codec name whether a file must be re-encoded
#[derive(Debug, Clone)]
pub struct CodecClassifier {
    transcode: Regex,
}

impl CodecClassifier {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let transcode = regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()?;
        Ok(Self { transcode })
    }

    /// Files without a video stream are never transcoded
    pub fn needs_transcode(&self, codec: Option<&str>) -> bool {
        codec
            .map(|c| self.transcode.is_match(c.trim()))
            .unwrap_or(false)
    }
}

/// ffprobe/ffmpeg backed implementation of [`MediaTools`]
pub struct FFmpegTools {
    settings: EncoderSettings,
}

impl FFmpegTools {
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    /// Build base FFmpeg command, lowered in priority in background mode
    fn build_base_command(&self) -> Command {
        let mut cmd = if self.settings.background {
            let mut c = tool_command("nice");
            c.args(["-n", "19"]);
            c.arg(&self.settings.ffmpeg_bin);
            c
        } else {
            tool_command(&self.settings.ffmpeg_bin)
        };
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"]);
        cmd
    }

    /// Add encoding options to FFmpeg command
    fn add_encoding_options(&self, cmd: &mut Command, output: &Path) {
        cmd.args(["-c:v", &self.settings.video_encoder]);
        if !self.settings.crf.is_empty() {
            cmd.args(["-crf", &self.settings.crf]);
        }
        if !self.settings.preset.is_empty() {
            cmd.args(["-preset", &self.settings.preset]);
        }
        cmd.args(&self.settings.extra_args);
        cmd.args(["-c:a", &self.settings.audio_codec]);

        // Apple players only recognise HEVC in MP4/MOV with the hvc1 tag
        let mp4_family = output
            .extension()
            .map(|e| {
                let e = e.to_string_lossy().to_lowercase();
                e == "mp4" || e == "mov" || e == "m4v"
            })
            .unwrap_or(false);
        if mp4_family {
            cmd.args(["-tag:v", "hvc1"]);
        }
    }
}

impl MediaTools for FFmpegTools {
    fn probe_video_codec(&self, input: &Path) -> Result<Option<String>, ProcessingError> {
        let probe_error = |reason: String| ProcessingError::Probe {
            path: input.to_path_buf(),
            reason,
        };

        let mut cmd = tool_command(&self.settings.ffprobe_bin);
        cmd.args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]);
        cmd.arg(input);
        cmd.stdin(Stdio::null());

        debug!("Executing ffprobe command: {:?}", cmd);
        let output = cmd.output().map_err(|e| probe_error(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_error(stderr.trim().to_string()));
        }

        Ok(parse_codec_name(&String::from_utf8_lossy(&output.stdout)))
    }

    fn transcode(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        let transcode_error = |reason: String| ProcessingError::Transcode {
            path: input.to_path_buf(),
            reason,
        };

        let mut cmd = self.build_base_command();
        cmd.arg("-i").arg(input);
        self.add_encoding_options(&mut cmd, output);
        cmd.arg("-y").arg(output);
        cmd.stdin(Stdio::null());

        debug!("Executing FFmpeg command: {:?}", cmd);
        let result = cmd.output().map_err(|e| transcode_error(e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(transcode_error(stderr.trim().to_string()));
        }
        Ok(())
    }
}

/// Command for an external tool, started in its own process group so a
/// terminal Ctrl-C reaches hevcify only and running encodes can finish
fn tool_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

/// First non-empty line of ffprobe's bare `codec_name` output, lowercased
fn parse_codec_name(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_lowercase)
}
