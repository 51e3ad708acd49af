//! Video encoding through an `ffmpeg` child process.
//!
//! Frames are PNG screenshots piped to ffmpeg's stdin as an `image2pipe`
//! stream. The file only becomes playable after [`VideoRecorder::finish`].

mod clock;

pub use clock::FrameClock;

use crate::config::Size;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

/// Output stream settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    /// Frame size of the encoded video. Input frames are scaled to it.
    pub size: Size,
    pub fps: u32,
}

/// Bytes of ffmpeg stderr kept for error reports.
const STDERR_TAIL: usize = 8 * 1024;

/// A running ffmpeg encoder.
pub struct VideoRecorder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    path: PathBuf,
    frames: u64,
}

impl VideoRecorder {
    /// Whether ffmpeg can be spawned from `PATH`.
    pub async fn ffmpeg_available() -> bool {
        Command::new(FFMPEG_BINARY)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Spawn the encoder writing to `path`. An existing file is overwritten.
    pub async fn start(path: impl AsRef<Path>, settings: VideoSettings) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let args = ffmpeg_args(&path, settings);
        debug!("Spawning {} {}", FFMPEG_BINARY, args.join(" "));

        let mut child = Command::new(FFMPEG_BINARY)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Encoder(format!("failed to spawn {}: {}", FFMPEG_BINARY, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Encoder("ffmpeg stdin unavailable".into()))?;
        // Drained continuously so a chatty encoder never blocks on a full pipe.
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe)));

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr,
            path,
            frames: 0,
        })
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Write one encoded image (PNG) as the next frame.
    pub async fn push_frame(&mut self, image: &[u8]) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(Error::Encoder("recorder already finished".into()));
        };
        if let Err(e) = stdin.write_all(image).await {
            return Err(Error::Encoder(format!(
                "ffmpeg stopped accepting frames after {}: {}",
                self.frames, e
            )));
        }
        self.frames += 1;
        Ok(())
    }

    /// Close the input and wait for ffmpeg to write the file.
    ///
    /// On failure the partial file is removed.
    pub async fn finish(mut self) -> Result<PathBuf> {
        let flushed = match self.stdin.take() {
            Some(mut stdin) => stdin.flush().await,
            None => Ok(()),
        };
        if let Err(e) = flushed {
            let err = Error::Encoder(format!("failed to flush frames to ffmpeg: {}", e));
            self.abort().await;
            return Err(err);
        }

        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => {
                self.abort().await;
                return Err(e.into());
            }
        };
        let stderr = self.stderr_text().await;
        if !status.success() {
            remove_partial(&self.path).await;
            return Err(Error::Encoder(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        debug!("Encoded {} frames into {}", self.frames, self.path.display());
        Ok(self.path)
    }

    async fn stderr_text(&mut self) -> String {
        match self.stderr.take() {
            Some(task) => String::from_utf8_lossy(&task.await.unwrap_or_default()).into_owned(),
            None => String::new(),
        }
    }

    /// Kill the encoder and remove whatever it wrote.
    pub async fn abort(mut self) {
        self.stdin.take();
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill ffmpeg: {}", e);
        }
        if let Some(task) = self.stderr.take() {
            task.abort();
        }
        remove_partial(&self.path).await;
    }
}

/// Read ffmpeg's stderr to EOF, keeping the tail.
async fn drain(mut pipe: ChildStderr) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL {
                    tail.drain(..tail.len() - STDERR_TAIL);
                }
            }
        }
    }
    tail
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial recording {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Command line for a PNG-over-stdin to H.264 encode.
pub fn ffmpeg_args(output: &Path, settings: VideoSettings) -> Vec<String> {
    let fps = settings.fps.to_string();
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "image2pipe".into(),
        "-framerate".into(),
        fps.clone(),
        "-c:v".into(),
        "png".into(),
        "-i".into(),
        "pipe:0".into(),
        "-vf".into(),
        format!("scale={}:{}", settings.size.width, settings.size.height),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        fps,
        output.to_string_lossy().into_owned(),
    ]
}
