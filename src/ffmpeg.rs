//! Control over FFmpeg's own console output.
//!
//! FFmpeg writes diagnostics straight to stderr, independently of the `log`
//! facade this crate uses. An upscale touches a demuxer, a decoder, a
//! scaler, an encoder, and a muxer, each of which may chatter; the CLI
//! silences them by default and exposes `--log-level` to turn them
//! back on.
//!
//! ```no_run
//! use videoboost::FfmpegLogLevel;
//!
//! videoboost::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! assert_eq!(videoboost::ffmpeg_log_level(), Some(FfmpegLogLevel::Error));
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::{self as av_log, Level};

/// FFmpeg verbosity, from silent to most verbose.
///
/// Messages below the selected severity are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FfmpegLogLevel {
    /// No output.
    Quiet,
    /// Conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings; FFmpeg's own default.
    Warning,
    /// Informational messages.
    Info,
    /// Detailed informational messages.
    Verbose,
    /// Debugging output.
    Debug,
    /// Everything.
    Trace,
}

const LEVEL_NAMES: [(FfmpegLogLevel, &str); 9] = [
    (FfmpegLogLevel::Quiet, "quiet"),
    (FfmpegLogLevel::Panic, "panic"),
    (FfmpegLogLevel::Fatal, "fatal"),
    (FfmpegLogLevel::Error, "error"),
    (FfmpegLogLevel::Warning, "warning"),
    (FfmpegLogLevel::Info, "info"),
    (FfmpegLogLevel::Verbose, "verbose"),
    (FfmpegLogLevel::Debug, "debug"),
    (FfmpegLogLevel::Trace, "trace"),
];

impl FfmpegLogLevel {
    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        LEVEL_NAMES
            .iter()
            .find_map(|&(level, name)| (level == self).then_some(name))
            .unwrap_or("quiet")
    }
}

impl From<FfmpegLogLevel> for Level {
    fn from(level: FfmpegLogLevel) -> Self {
        match level {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

impl From<Level> for FfmpegLogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        LEVEL_NAMES
            .iter()
            .find_map(|&(level, name)| (name == wanted).then_some(level))
            .ok_or_else(|| {
                let known: Vec<&str> = LEVEL_NAMES.iter().map(|&(_, name)| name).collect();
                format!("unknown FFmpeg log level '{value}', expected one of: {}", known.join(", "))
            })
    }
}

/// Set FFmpeg's console verbosity. Does not affect `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    av_log::set_level(level.into());
}

/// FFmpeg's current console verbosity, if it maps onto a known level.
pub fn ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    av_log::get_level().ok().map(FfmpegLogLevel::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for (level, name) in LEVEL_NAMES {
            assert_eq!(level.name(), name);
            assert_eq!(name.parse::<FfmpegLogLevel>(), Ok(level));
        }
        assert_eq!(" WARNING ".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Warning));
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }

    #[test]
    fn levels_order_by_verbosity() {
        assert!(FfmpegLogLevel::Quiet < FfmpegLogLevel::Error);
        assert!(FfmpegLogLevel::Error < FfmpegLogLevel::Trace);
    }
}
