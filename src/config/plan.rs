use super::schema::{Config, PrepareConfig, Size};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// A config with every path resolved. This is what the runner executes.
#[derive(Debug, Clone)]
pub struct CapturePlan {
    /// Absolute path of the HTML document.
    pub page_path: PathBuf,
    /// `file://` URL of the document.
    pub page_url: String,
    /// Directory the video is written to.
    pub output_dir: PathBuf,
    /// Full path of the video file.
    pub output_path: PathBuf,
    pub viewport: Size,
    pub video_size: Size,
    pub fps: u32,
    pub duration: Duration,
    pub prepare: PrepareConfig,
}

impl CapturePlan {
    pub(crate) fn from_config(
        config: &Config,
        base_dir: &Path,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let base = absolutize(base_dir)?;
        let page_path = clean(&base.join(&config.page.path));
        let page_url = url::Url::from_file_path(&page_path)
            .map_err(|_| {
                Error::Config(format!(
                    "cannot build file URL for '{}'",
                    page_path.display()
                ))
            })?
            .to_string();

        let output_dir = clean(&base.join(&config.video.dir));
        let file_name = match config.video.file_name {
            Some(ref name) => name.clone(),
            None => default_file_name(now),
        };
        let output_path = output_dir.join(file_name);

        Ok(Self {
            page_path,
            page_url,
            output_dir,
            output_path,
            viewport: config.viewport,
            video_size: config.video.size,
            fps: config.video.fps,
            duration: Duration::from_millis(config.duration_ms),
            prepare: config.prepare.clone(),
        })
    }

    /// Check the filesystem before anything is launched.
    ///
    /// The page must exist. The output directory is created if missing.
    pub fn preflight(&self) -> Result<()> {
        if !self.page_path.is_file() {
            return Err(Error::Config(format!(
                "page not found: {}",
                self.page_path.display()
            )));
        }
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

/// Millisecond timestamp keeps back-to-back runs from colliding.
fn default_file_name(now: NaiveDateTime) -> String {
    format!("capture-{}.mp4", now.format("%Y%m%d-%H%M%S-%3f"))
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Lexically drop `.` and fold `..` components.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::default();
        let plan =
            CapturePlan::from_config(&config, Path::new("/srv/video"), at(9, 5, 7, 42)).unwrap();

        assert_eq!(plan.page_path, PathBuf::from("/srv/video/video-final.html"));
        assert_eq!(plan.page_url, "file:///srv/video/video-final.html");
        assert_eq!(plan.output_dir, PathBuf::from("/srv/video"));
        assert_eq!(
            plan.output_path,
            PathBuf::from("/srv/video/capture-20261016-090507-042.mp4")
        );
        assert_eq!(plan.viewport, Size::new(1080, 1080));
        assert_eq!(plan.video_size, Size::new(1080, 1080));
        assert_eq!(plan.fps, 30);
        assert_eq!(plan.duration, Duration::from_millis(19_000));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let yaml = r#"
page:
  path: "../pages/intro anim.html"
video:
  dir: "./out"
  file_name: "launch.mp4"
"#;
        let config = Config::parse(yaml).unwrap();
        let plan =
            CapturePlan::from_config(&config, Path::new("/srv/video"), at(0, 0, 0, 0)).unwrap();

        assert_eq!(plan.page_path, PathBuf::from("/srv/pages/intro anim.html"));
        assert_eq!(plan.page_url, "file:///srv/pages/intro%20anim.html");
        assert_eq!(plan.output_path, PathBuf::from("/srv/video/out/launch.mp4"));
    }

    #[test]
    fn test_resolve_absolute_page_ignores_base() {
        let yaml = r#"
page:
  path: "/tmp/page.html"
"#;
        let config = Config::parse(yaml).unwrap();
        let plan =
            CapturePlan::from_config(&config, Path::new("/srv/video"), at(0, 0, 0, 0)).unwrap();
        assert_eq!(plan.page_path, PathBuf::from("/tmp/page.html"));
    }

    #[test]
    fn test_generated_names_differ_per_run() {
        let config = Config::default();
        let base = Path::new("/srv/video");
        let first = CapturePlan::from_config(&config, base, at(12, 0, 0, 1)).unwrap();
        let second = CapturePlan::from_config(&config, base, at(12, 0, 0, 2)).unwrap();
        assert_ne!(first.output_path, second.output_path);
    }

    #[test]
    fn test_preflight_missing_page() {
        let dir =
            std::env::temp_dir().join(format!("eoka-capture-preflight-{}", std::process::id()));
        let yaml = r#"
page:
  path: "does-not-exist.html"
"#;
        let config = Config::parse(yaml).unwrap();
        let plan = CapturePlan::from_config(&config, &dir, at(0, 0, 0, 0)).unwrap();

        let err = plan.preflight().unwrap_err();
        assert!(err.to_string().contains("page not found"), "{}", err);
        assert!(!plan.output_path.exists());
    }

    #[test]
    fn test_preflight_creates_output_dir() {
        let dir =
            std::env::temp_dir().join(format!("eoka-capture-outdir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page.html"), "<html></html>").unwrap();
        let yaml = r#"
page:
  path: "page.html"
video:
  dir: "nested/out"
"#;
        let config = Config::parse(yaml).unwrap();
        let plan = CapturePlan::from_config(&config, &dir, at(0, 0, 0, 0)).unwrap();

        plan.preflight().unwrap();
        assert!(dir.join("nested/out").is_dir());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
