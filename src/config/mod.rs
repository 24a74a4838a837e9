use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Worker count used when none is configured
pub const DEFAULT_WORKERS: usize = 5;

/// Run configuration handed to the dispatcher and its collaborators
#[derive(Debug, Clone)]
pub struct Config {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub workers: NonZeroUsize,
    /// Lowercase extensions to accept. Empty accepts every file with an extension.
    pub extensions: Vec<String>,
    pub encoder: EncoderSettings,
}

impl Config {
    pub fn new(input_root: PathBuf, output_root: PathBuf, workers: NonZeroUsize) -> Self {
        Self {
            input_root,
            output_root,
            workers,
            extensions: Vec::new(),
            encoder: EncoderSettings::default(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderSettings) -> Self {
        self.encoder = encoder;
        self
    }
}

/// FFmpeg invocation and codec classification settings
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub video_encoder: String,
    pub crf: String,
    pub preset: String,
    pub audio_codec: String,
    pub extra_args: Vec<String>,
    /// Regex matched against the probed codec name; a match means re-encode
    pub transcode_codecs: String,
    pub output_extension: String,
    /// Run encoders under `nice -n 19`
    pub background: bool,
}

impl EncoderSettings {
    /// Load encoder settings from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: env::var("FFPROBE_BIN").unwrap_or(defaults.ffprobe_bin),
            video_encoder: env::var("FFMPEG_VIDEO_ENCODER").unwrap_or(defaults.video_encoder),
            crf: env::var("FFMPEG_CRF").unwrap_or(defaults.crf),
            preset: env::var("FFMPEG_PRESET").unwrap_or(defaults.preset),
            audio_codec: env::var("FFMPEG_AUDIO_CODEC").unwrap_or(defaults.audio_codec),
            extra_args: env::var("FFMPEG_EXTRA_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.extra_args),
            transcode_codecs: env::var("HEVCIFY_TRANSCODE_CODECS")
                .unwrap_or(defaults.transcode_codecs),
            output_extension: env::var("HEVCIFY_OUTPUT_EXTENSION")
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .unwrap_or(defaults.output_extension),
            background: defaults.background,
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            video_encoder: "libx265".to_string(),
            crf: "23".to_string(),
            preset: "medium".to_string(),
            audio_codec: "copy".to_string(),
            extra_args: Vec::new(),
            transcode_codecs: "^(h264|avc1?)$".to_string(),
            output_extension: "mp4".to_string(),
            background: false,
        }
    }
}
