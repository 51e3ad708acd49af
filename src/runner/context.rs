use crate::config::CapturePlan;
use crate::recorder::{FrameClock, VideoRecorder, VideoSettings};
use crate::{Error, Result};
use eoka::Page;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// A page with a recorder attached.
///
/// Frames are only captured inside [`capture_for`](Self::capture_for).
/// The video exists once [`close`](Self::close) returns.
pub struct RecordingContext<'a> {
    page: &'a Page,
    recorder: VideoRecorder,
    clock: FrameClock,
    started: Option<Instant>,
    last_frame: Option<Vec<u8>>,
}

impl<'a> RecordingContext<'a> {
    /// Start the encoder for `plan`'s output file.
    pub async fn open(page: &'a Page, plan: &CapturePlan) -> Result<Self> {
        let settings = VideoSettings {
            size: plan.video_size,
            fps: plan.fps,
        };
        debug!(
            "Opening recording context (viewport: {}, video: {} @ {}fps)",
            plan.viewport, plan.video_size, plan.fps
        );
        let recorder = VideoRecorder::start(&plan.output_path, settings).await?;
        Ok(Self {
            page,
            recorder,
            clock: FrameClock::new(plan.fps, plan.duration),
            started: None,
            last_frame: None,
        })
    }

    /// Pin the start of the video timeline to now.
    ///
    /// Anything that happens between this and the first grab is covered by
    /// repeating that first frame.
    pub fn start(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    /// Capture frames until `duration` has elapsed since [`start`](Self::start).
    pub async fn capture_for(&mut self, duration: Duration) -> Result<()> {
        let started = *self.started.get_or_insert_with(Instant::now);
        loop {
            let elapsed = started.elapsed();
            if elapsed >= duration && self.last_frame.is_some() {
                break;
            }

            let frame = self.page.screenshot().await?;
            let copies = self.clock.advance(elapsed);
            for _ in 0..copies {
                self.recorder.push_frame(&frame).await?;
            }
            self.last_frame = Some(frame);

            let next = self.clock.next_frame_at();
            let now = started.elapsed();
            if next > now {
                tokio::time::sleep(next - now).await;
            }
        }
        debug!(
            "Captured {} of {} frames in {}ms",
            self.clock.written(),
            self.clock.total(),
            started.elapsed().as_millis()
        );
        Ok(())
    }

    /// Pad the tail, then finalize the video.
    ///
    /// No file is left behind when this fails.
    pub async fn close(mut self) -> Result<(PathBuf, u64)> {
        if let Err(e) = self.pad_tail().await {
            self.recorder.abort().await;
            return Err(e);
        }
        let frames = self.recorder.frames();
        let path = self.recorder.finish().await?;
        Ok((path, frames))
    }

    async fn pad_tail(&mut self) -> Result<()> {
        let missing = self.clock.finish();
        if missing == 0 {
            return Ok(());
        }
        let frame = self
            .last_frame
            .take()
            .ok_or_else(|| Error::Encoder("no frames captured".into()))?;
        for _ in 0..missing {
            self.recorder.push_frame(&frame).await?;
        }
        Ok(())
    }

    /// Drop the recording without producing a file.
    pub async fn abort(self) {
        self.recorder.abort().await;
    }
}
