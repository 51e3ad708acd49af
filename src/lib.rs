//! # eoka-capture
//!
//! Record a local web page to video. Launches headless Chrome, opens the
//! page, captures the viewport for a fixed duration and encodes it with
//! ffmpeg.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_capture::Config;
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_capture::Result<()> {
//! let config = Config::load("capture.yaml")?;
//! let result = eoka_capture::capture(&config, ".").await?;
//! println!("Video saved to: {}", result.output_dir.display());
//! # Ok(())
//! # }
//! ```

mod config;
mod recorder;
mod runner;

pub use config::{
    BrowserConfig, CapturePlan, Config, PageConfig, PrepareConfig, Size, VideoConfig,
};
pub use recorder::{ffmpeg_args, FrameClock, VideoRecorder, VideoSettings};
pub use runner::{capture, CaptureResult, RecordingContext, Runner};

/// Result type for eoka-capture operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or capture.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("encoder error: {0}")]
    Encoder(String),
}
