//! Convenient re-exports for common usage.
//!
//! ```rust
//! use gtkwave_embed::prelude::*;
//! ```

pub use crate::bbox::{BoundingBox, accept_frame, content_box};
pub use crate::capture::{Capture, CaptureRequest, XvfbCapture};
pub use crate::config::{DisplaySettings, Settings};
pub use crate::display::{Background, FrameSource, ScreenSize};
pub use crate::document::DocContext;
pub use crate::error::{GtkwaveError, Result};
pub use crate::extension::{App, Backend, Build, BuildContext, Builder};
pub use crate::node::{EmbedNode, ImageNode};
pub use crate::process::ProcessOutput;
