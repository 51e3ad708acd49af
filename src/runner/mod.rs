mod context;

pub use context::RecordingContext;

use crate::config::{BrowserConfig, CapturePlan, Config, PrepareConfig, Size};
use crate::recorder::VideoRecorder;
use crate::{Error, Result};
use eoka::{Browser, Page};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Poll interval for the font readiness check.
const FONTS_POLL_MS: u64 = 50;

const FONTS_STATUS_JS: &str = "document.fonts ? document.fonts.status : 'loaded'";

/// Result of a finished capture.
#[derive(Debug)]
pub struct CaptureResult {
    /// The video file.
    pub video: PathBuf,
    /// Directory holding the video.
    pub output_dir: PathBuf,
    /// Frames in the encoded stream.
    pub frames: u64,
    /// Wall time of the whole capture in milliseconds.
    pub duration_ms: u64,
}

/// One headless browser with one page.
pub struct Runner {
    browser: Browser,
    page: Page,
}

impl Runner {
    /// Launch the browser with the given viewport.
    pub async fn launch(config: &BrowserConfig, viewport: Size) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            viewport_width: viewport.width,
            viewport_height: viewport.height,
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, viewport: {})",
            config.headless, viewport
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self { browser, page })
    }

    /// Record `plan` into its output file.
    ///
    /// The recording context is closed on success and aborted on failure,
    /// so no half-written file is left behind.
    pub async fn record(&self, plan: &CapturePlan) -> Result<CaptureResult> {
        let start = Instant::now();
        let prepare = &plan.prepare;

        if prepare.reload {
            info!("Loading {}", plan.page_url);
            self.page.goto(&plan.page_url).await?;
            if prepare.wait_for_fonts {
                self.wait_for_fonts(prepare).await?;
            }
            if prepare.settle_ms > 0 {
                self.page.wait(prepare.settle_ms).await;
            }
        }

        info!("Starting recording: {}", plan.output_path.display());
        let mut context = RecordingContext::open(&self.page, plan).await?;

        match self.play(&mut context, plan).await {
            Ok(()) => {
                info!("Finalizing video");
                let (video, frames) = context.close().await?;
                Ok(CaptureResult {
                    video,
                    output_dir: plan.output_dir.clone(),
                    frames,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                warn!("Capture failed, discarding recording: {}", e);
                context.abort().await;
                Err(e)
            }
        }
    }

    async fn play(&self, context: &mut RecordingContext<'_>, plan: &CapturePlan) -> Result<()> {
        context.start();
        if plan.prepare.reload {
            debug!("Reloading to restart the page");
            self.page.reload().await?;
        } else {
            info!("Loading {}", plan.page_url);
            self.page.goto(&plan.page_url).await?;
        }
        if plan.prepare.wait_for_fonts {
            self.wait_for_fonts(&plan.prepare).await?;
        }

        info!("Recording for {}ms", plan.duration.as_millis());
        context.capture_for(plan.duration).await
    }

    /// Poll `document.fonts` until loaded. A timeout is not an error.
    async fn wait_for_fonts(&self, prepare: &PrepareConfig) -> Result<()> {
        let timeout = Duration::from_millis(prepare.fonts_timeout_ms);
        let started = Instant::now();
        loop {
            let status: String = self.page.evaluate(FONTS_STATUS_JS).await?;
            if status == "loaded" {
                debug!("Fonts loaded");
                return Ok(());
            }
            if started.elapsed() >= timeout {
                warn!(
                    "Fonts still '{}' after {}ms, continuing",
                    status, prepare.fonts_timeout_ms
                );
                return Ok(());
            }
            self.page.wait(FONTS_POLL_MS).await;
        }
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

/// Run a full capture: preflight, launch, record, tear down.
///
/// The browser is closed whether or not recording succeeded.
pub async fn capture(config: &Config, base_dir: impl AsRef<Path>) -> Result<CaptureResult> {
    let plan = config.resolve(base_dir)?;
    plan.preflight()?;
    if !VideoRecorder::ffmpeg_available().await {
        return Err(Error::Encoder("ffmpeg not found on PATH".into()));
    }

    let runner = Runner::launch(&config.browser, plan.viewport).await?;
    let recorded = runner.record(&plan).await;
    let closed = runner.close().await;

    match (recorded, closed) {
        (Ok(result), Ok(())) => Ok(result),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!("Failed to close browser: {}", close_err);
            }
            Err(e)
        }
    }
}
