//! Off-screen X display for headless screenshots.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::DisplaySettings;
use crate::error::{GtkwaveError, Result};

/// Default screen size in pixels.
pub const DEFAULT_SCREEN: ScreenSize = ScreenSize {
    width: 1024,
    height: 768,
};

/// Poll interval while waiting for the X server socket.
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// First display number probed for a free slot.
const FIRST_DISPLAY: u32 = 10;
const LAST_DISPLAY: u32 = 1000;

/// Servers started before giving up on a display number race.
const START_ATTEMPTS: usize = 5;

enum Startup {
    Ready,
    Exited(ExitStatus),
}

/// Screen size of a virtual display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for ScreenSize {
    type Err = String;

    /// Parse `"WxH"`, e.g. `"1024x768"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once('x')
            .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid width in {s:?}"))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid height in {s:?}"))?;
        Ok(Self { width, height })
    }
}

/// Background color of the X root window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Black,
    White,
}

impl Background {
    fn server_flag(self) -> &'static str {
        match self {
            Background::Black => "-br",
            Background::White => "-wr",
        }
    }

    pub fn rgb(self) -> Rgb<u8> {
        match self {
            Background::Black => Rgb([0, 0, 0]),
            Background::White => Rgb([255, 255, 255]),
        }
    }
}

impl FromStr for Background {
    type Err = GtkwaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "black" => Ok(Background::Black),
            "white" => Ok(Background::White),
            _ => Err(GtkwaveError::Display(format!(
                "unsupported background color {s:?}, use black or white"
            ))),
        }
    }
}

/// Configuration for a virtual display.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub size: ScreenSize,
    /// Show the display in a nested window instead of running off-screen.
    pub visible: bool,
    pub background: Background,
    pub settings: DisplaySettings,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SCREEN,
            visible: false,
            background: Background::White,
            settings: DisplaySettings::default(),
        }
    }
}

/// Something that can produce screenshots of a display.
pub trait FrameSource {
    /// Value for the `DISPLAY` variable of processes drawing on this source.
    fn display_name(&self) -> Option<&str>;

    /// Grab the whole screen.
    fn grab(&self) -> impl Future<Output = Result<RgbImage>> + Send;
}

/// The screen of an X display, grabbed through an external command.
#[derive(Debug, Clone)]
pub struct XScreen {
    name: String,
    grab_command: Vec<String>,
}

impl XScreen {
    pub fn new(name: impl Into<String>, grab_command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            grab_command,
        }
    }
}

/// A running Xvfb (or Xephyr, when visible) server.
///
/// The server is killed when the handle is dropped.
pub struct VirtualDisplay {
    screen: XScreen,
    server: Child,
}

impl VirtualDisplay {
    /// Start a server on the first free display number and wait for it to
    /// accept connections.
    ///
    /// Free numbers are not reserved, so a concurrent build can claim the same
    /// one. When the server exits and the lock file has appeared meanwhile, the
    /// next number is tried.
    pub async fn start(config: &DisplayConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.settings.start_timeout_ms);
        let mut first = FIRST_DISPLAY;

        for _ in 0..START_ATTEMPTS {
            let number = free_display_number(first)?;
            let mut display = Self::spawn(config, number)?;

            match display.wait_ready(timeout, number).await? {
                Startup::Ready => return Ok(display),
                Startup::Exited(status) if lock_path(number).exists() => {
                    let name = display.name();
                    debug!(display = %name, %status, "display number taken, retrying");
                    first = number + 1;
                }
                Startup::Exited(status) => {
                    return Err(GtkwaveError::Display(format!(
                        "X server for {} exited early: {status}",
                        display.name()
                    )));
                }
            }
        }

        Err(GtkwaveError::Display(format!(
            "no display started after {START_ATTEMPTS} attempts"
        )))
    }

    fn spawn(config: &DisplayConfig, number: u32) -> Result<Self> {
        let name = format!(":{number}");
        let settings = &config.settings;

        let (program, screen) = if config.visible {
            (
                &settings.xephyr,
                format!("{}x{}", config.size.width, config.size.height),
            )
        } else {
            (
                &settings.xvfb,
                format!(
                    "{}x{}x{}",
                    config.size.width, config.size.height, settings.color_depth
                ),
            )
        };

        let mut cmd = Command::new(program);
        if config.visible {
            cmd.args([name.as_str(), "-screen", screen.as_str()]);
        } else {
            cmd.args([name.as_str(), "-screen", "0", screen.as_str()]);
        }
        cmd.args(["-nolisten", "tcp", config.background.server_flag()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let server = cmd
            .spawn()
            .map_err(|e| GtkwaveError::SpawnFailed(format!("{program}: {e}")))?;
        info!(display = %name, program = %program, %screen, "starting virtual display");

        Ok(Self {
            screen: XScreen::new(name, settings.grab_command.clone()),
            server,
        })
    }

    async fn wait_ready(&mut self, timeout: Duration, number: u32) -> Result<Startup> {
        let socket = socket_path(number);
        let deadline = Instant::now().checked_add(timeout);

        while deadline.is_none_or(|d| Instant::now() < d) {
            if let Some(status) = self.server.try_wait()? {
                return Ok(Startup::Exited(status));
            }
            if socket.exists() {
                debug!(display = %self.name(), "virtual display ready");
                return Ok(Startup::Ready);
            }
            tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
        }

        Err(GtkwaveError::Display(format!(
            "X server for {} not ready after {timeout:?}",
            self.name()
        )))
    }

    /// Display name, e.g. `:10`.
    pub fn name(&self) -> &str {
        &self.screen.name
    }

    /// The screen to grab frames from.
    pub fn screen(&self) -> &XScreen {
        &self.screen
    }

    /// Shut the server down.
    pub async fn stop(mut self) -> Result<()> {
        if self.server.try_wait()?.is_none() {
            self.server.kill().await?;
        }
        debug!(display = %self.name(), "virtual display stopped");
        Ok(())
    }
}

impl FrameSource for XScreen {
    fn display_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    async fn grab(&self) -> Result<RgbImage> {
        grab_screen(&self.name, &self.grab_command).await
    }
}

/// Run the grab command against `display` and decode the image it prints.
async fn grab_screen(display: &str, grab_command: &[String]) -> Result<RgbImage> {
    let Some((program, args)) = grab_command.split_first() else {
        return Err(GtkwaveError::Config("grab command is empty".to_string()));
    };
    let output = Command::new(program)
        .args(args)
        .env("DISPLAY", display)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| GtkwaveError::SpawnFailed(format!("{program}: {e}")))?;

    if !output.status.success() {
        return Err(GtkwaveError::Display(format!(
            "{program} failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(image::load_from_memory(&output.stdout)?.to_rgb8())
}

fn lock_path(number: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/.X{number}-lock"))
}

fn socket_path(number: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/.X11-unix/X{number}"))
}

fn free_display_number(first: u32) -> Result<u32> {
    (first..LAST_DISPLAY)
        .find(|n| !lock_path(*n).exists() && !socket_path(*n).exists())
        .ok_or_else(|| GtkwaveError::Display("no free display number".to_string()))
}
