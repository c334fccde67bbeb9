//! Run the viewer on a virtual display and save a cropped screenshot.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use image::RgbImage;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::bbox::{accept_frame, autocrop, crop_to_content};
use crate::config::DisplaySettings;
use crate::display::{Background, DisplayConfig, FrameSource, ScreenSize, VirtualDisplay};
use crate::error::{GtkwaveError, Result};
use crate::process::{ProcessOutput, ViewerProcess};

/// Delay before the first grab.
pub const FIRST_GRAB_DELAY: Duration = Duration::from_millis(300);

/// Delay before the second grab; every following delay grows by this much.
pub const GRAB_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Everything needed for one screenshot of the viewer.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Viewer command line.
    pub command: Vec<String>,
    /// Where the cropped PNG goes.
    pub output: PathBuf,
    /// Fixed delay after starting the viewer, to skip the splash screen.
    pub wait: Duration,
    /// How long to poll for an accepted frame.
    pub timeout: Duration,
    pub screen: ScreenSize,
    pub visible: bool,
    pub bgcolor: String,
}

/// Produces the screenshot for a [`CaptureRequest`].
pub trait Capture: Send + Sync {
    /// Capture and save the screenshot, returning the viewer's output.
    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput>> + Send + 'a>>;
}

/// Captures through a real Xvfb/Xephyr display.
#[derive(Debug, Clone, Default)]
pub struct XvfbCapture {
    settings: DisplaySettings,
}

impl XvfbCapture {
    pub fn new(settings: DisplaySettings) -> Self {
        Self { settings }
    }
}

impl Capture for XvfbCapture {
    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessOutput>> + Send + 'a>> {
        Box::pin(prog_shot(request, &self.settings))
    }
}

/// Start a virtual display, run the viewer in it and save the screenshot.
pub async fn prog_shot(
    request: &CaptureRequest,
    settings: &DisplaySettings,
) -> Result<ProcessOutput> {
    let config = DisplayConfig {
        size: request.screen,
        visible: request.visible,
        background: request.bgcolor.parse()?,
        settings: settings.clone(),
    };

    let display = VirtualDisplay::start(&config).await?;
    let result = capture_with(display.screen(), request, config.background).await;
    let stopped = display.stop().await;

    let output = result?;
    stopped?;
    Ok(output)
}

/// Run the viewer against an already running frame source.
///
/// The viewer is stopped before the screenshot is cropped and saved; on any
/// error the process handle is dropped, which kills it.
pub async fn capture_with<S: FrameSource>(
    source: &S,
    request: &CaptureRequest,
    background: Background,
) -> Result<ProcessOutput> {
    let mut proc = ViewerProcess::spawn(&request.command, source.display_name())?;

    if !request.wait.is_zero() {
        tokio::time::sleep(request.wait).await;
    }

    let Some(frame) = wait_grab(source, request.timeout, background).await? else {
        if !proc.is_alive()? {
            let stderr = proc.stderr()?;
            let stdout = proc.stdout()?;
            eprintln!("gtkwave stderr: {stderr}");
            eprintln!("gtkwave stdout: {stdout}");
            warn!(%stdout, %stderr, "viewer exited before rendering");
        }
        let state = proc.state()?;
        proc.stop().await?;
        error!(timeout = ?request.timeout, process = %state, "no accepted screenshot");
        return Err(GtkwaveError::CaptureTimeout {
            timeout: request.timeout,
            process: Box::new(state),
        });
    };

    let output = proc.stop().await?;
    save_cropped(&frame, &request.output)?;
    Ok(output)
}

/// Grab frames until one is accepted or `timeout` has passed.
///
/// Frames are cropped to their non-background region first; frames that are
/// entirely background are skipped. Returns `None` on timeout, never before
/// the deadline.
pub async fn wait_grab<S: FrameSource>(
    source: &S,
    timeout: Duration,
    background: Background,
) -> Result<Option<RgbImage>> {
    // `None` when the timeout is too large to represent: poll forever.
    let deadline = Instant::now().checked_add(timeout);
    let mut delay = FIRST_GRAB_DELAY;
    let mut next_delay = GRAB_BACKOFF_STEP;

    loop {
        let remaining = deadline.map_or(delay, |d| d.saturating_duration_since(Instant::now()));
        tokio::time::sleep(delay.min(remaining)).await;

        let frame = source.grab().await?;
        if let Some(frame) = autocrop(&frame, background.rgb()) {
            if accept_frame(&frame) {
                return Ok(Some(frame));
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(None);
        }
        debug!(?next_delay, "frame not ready");
        delay = next_delay;
        next_delay += GRAB_BACKOFF_STEP;
    }
}

fn save_cropped(frame: &RgbImage, path: &Path) -> Result<()> {
    let cropped = crop_to_content(frame)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    cropped.save(path)?;
    info!(
        path = %path.display(),
        width = cropped.width(),
        height = cropped.height(),
        "saved screenshot"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::bbox::tests::waveform_frame;

    /// Serves blank frames until `ready_after` grabs have been made.
    struct CountingSource {
        grabs: AtomicUsize,
        ready_after: usize,
    }

    impl FrameSource for CountingSource {
        fn display_name(&self) -> Option<&str> {
            None
        }

        async fn grab(&self) -> Result<RgbImage> {
            let n = self.grabs.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_after {
                Ok(waveform_frame(80))
            } else {
                Ok(waveform_frame(5))
            }
        }
    }

    #[tokio::test]
    async fn test_wait_grab_returns_first_accepted_frame() {
        let source = CountingSource {
            grabs: AtomicUsize::new(0),
            ready_after: 2,
        };
        let frame = wait_grab(&source, Duration::from_secs(5), Background::White)
            .await
            .unwrap();
        assert!(frame.is_some());
        assert_eq!(source.grabs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_grab_times_out_after_deadline() {
        let source = CountingSource {
            grabs: AtomicUsize::new(0),
            ready_after: usize::MAX,
        };
        let started = std::time::Instant::now();
        let frame = wait_grab(&source, Duration::from_secs(1), Background::White)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(frame.is_none());
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_timeout_grabs_once() {
        let source = CountingSource {
            grabs: AtomicUsize::new(0),
            ready_after: usize::MAX,
        };
        let frame = wait_grab(&source, Duration::ZERO, Background::White)
            .await
            .unwrap();
        assert!(frame.is_none());
        assert_eq!(source.grabs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_huge_timeout_polls_until_accepted() {
        let source = CountingSource {
            grabs: AtomicUsize::new(0),
            ready_after: 2,
        };
        let frame = wait_grab(&source, Duration::from_secs(u64::MAX), Background::White)
            .await
            .unwrap();
        assert!(frame.is_some());
        assert_eq!(source.grabs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsupported_bgcolor_fails_before_starting_display() {
        let request = CaptureRequest {
            command: vec!["true".to_string()],
            output: PathBuf::from("/tmp/never.png"),
            wait: Duration::ZERO,
            timeout: Duration::ZERO,
            screen: crate::display::DEFAULT_SCREEN,
            visible: false,
            bgcolor: "teal".to_string(),
        };
        let err = prog_shot(&request, &DisplaySettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GtkwaveError::Display(_)));
    }
}
