use super::plan::CapturePlan;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Longest recording accepted, one hour.
pub const MAX_DURATION_MS: u64 = 60 * 60 * 1000;
/// Longest font wait accepted.
pub const MAX_FONTS_TIMEOUT_MS: u64 = 60 * 1000;
/// Longest pre-recording settle accepted.
pub const MAX_SETTLE_MS: u64 = 60 * 1000;
/// Highest frame rate accepted.
pub const MAX_FPS: u32 = 240;

/// Top-level capture config.
///
/// Every field has a default, so an empty document (or no file at all)
/// describes the stock 1080x1080 launch-video capture.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name shown in `--check` output and logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Browser launch options.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Document to record.
    #[serde(default)]
    pub page: PageConfig,

    /// Browser viewport size.
    #[serde(default = "Size::square_1080")]
    pub viewport: Size,

    /// Recording output.
    #[serde(default)]
    pub video: VideoConfig,

    /// How long to record, in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,

    /// Steps run between navigation and the timed capture.
    #[serde(default)]
    pub prepare: PrepareConfig,
}

fn default_name() -> String {
    "capture".into()
}

fn default_duration_ms() -> u64 {
    // The launch animation's last cue starts at ~18s.
    19_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            browser: BrowserConfig::default(),
            page: PageConfig::default(),
            viewport: Size::square_1080(),
            video: VideoConfig::default(),
            duration_ms: default_duration_ms(),
            prepare: PrepareConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        // A comment-only file is null rather than an empty map.
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let config: Config = if value.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(value)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the config.
    pub fn validate(&self) -> Result<()> {
        if self.page.path.trim().is_empty() {
            return Err(Error::Config("page.path is required".into()));
        }
        if self.duration_ms == 0 {
            return Err(Error::Config("duration_ms must be greater than 0".into()));
        }
        if self.duration_ms > MAX_DURATION_MS {
            return Err(Error::Config(format!(
                "duration_ms must be at most {}, got {}",
                MAX_DURATION_MS, self.duration_ms
            )));
        }
        if self.video.fps == 0 {
            return Err(Error::Config("video.fps must be at least 1".into()));
        }
        if self.video.fps > MAX_FPS {
            return Err(Error::Config(format!(
                "video.fps must be at most {}, got {}",
                MAX_FPS, self.video.fps
            )));
        }
        if self.prepare.fonts_timeout_ms > MAX_FONTS_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "prepare.fonts_timeout_ms must be at most {}, got {}",
                MAX_FONTS_TIMEOUT_MS, self.prepare.fonts_timeout_ms
            )));
        }
        if self.prepare.settle_ms > MAX_SETTLE_MS {
            return Err(Error::Config(format!(
                "prepare.settle_ms must be at most {}, got {}",
                MAX_SETTLE_MS, self.prepare.settle_ms
            )));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::Config(format!(
                "viewport must be non-zero, got {}",
                self.viewport
            )));
        }
        let size = self.video.size;
        if size.width == 0 || size.height == 0 {
            return Err(Error::Config(format!(
                "video.size must be non-zero, got {}",
                size
            )));
        }
        // yuv420p needs even dimensions
        if size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(Error::Config(format!(
                "video.size must have even width and height, got {}",
                size
            )));
        }
        if let Some(ref name) = self.video.file_name {
            if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
                return Err(Error::Config(format!(
                    "video.file_name must be a bare file name, got '{}'",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Resolve relative paths against `base_dir` and fix the output file name.
    pub fn resolve(&self, base_dir: impl AsRef<Path>) -> Result<CapturePlan> {
        CapturePlan::from_config(self, base_dir.as_ref(), chrono::Local::now().naive_local())
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Custom user agent.
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// The local document to open.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// HTML file, relative to the config file's directory.
    pub path: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            path: "video-final.html".into(),
        }
    }
}

/// Width x height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn square_1080() -> Self {
        Self::new(1080, 1080)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Recording output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// Output directory, relative to the config file's directory.
    #[serde(default = "default_video_dir")]
    pub dir: String,

    /// Frame size of the recording.
    #[serde(default = "Size::square_1080")]
    pub size: Size,

    /// Frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Fixed output file name. Generated per run when unset.
    pub file_name: Option<String>,
}

fn default_video_dir() -> String {
    ".".into()
}

fn default_fps() -> u32 {
    30
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            dir: default_video_dir(),
            size: Size::square_1080(),
            fps: default_fps(),
            file_name: None,
        }
    }
}

/// Steps between navigation and the timed capture.
#[derive(Debug, Clone, Deserialize)]
pub struct PrepareConfig {
    /// Wait for `document.fonts` to finish loading.
    #[serde(default = "default_true")]
    pub wait_for_fonts: bool,

    /// Upper bound for the font wait.
    #[serde(default = "default_fonts_timeout_ms")]
    pub fonts_timeout_ms: u64,

    /// Delay after the first load, before recording starts. Only used with `reload`.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Reload once recording has started so the animation plays from the top.
    #[serde(default = "default_true")]
    pub reload: bool,
}

fn default_fonts_timeout_ms() -> u64 {
    5_000
}

fn default_settle_ms() -> u64 {
    500
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            wait_for_fonts: true,
            fonts_timeout_ms: default_fonts_timeout_ms(),
            settle_ms: default_settle_ms(),
            reload: true,
        }
    }
}
