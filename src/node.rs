//! Document nodes produced by the directive.

use std::collections::BTreeMap;

use crate::display::{DEFAULT_SCREEN, ScreenSize};

/// Default delay after starting the viewer, in seconds.
pub const DEFAULT_WAIT: u64 = 1;
/// Default screenshot polling timeout, in seconds.
pub const DEFAULT_TIMEOUT: u64 = 12;
/// Default root window color.
pub const DEFAULT_BGCOLOR: &str = "white";

/// One `gtkwave` directive occurrence, consumed when the output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedNode {
    /// Trace files relative to the source root, in directive order.
    pub trace_files: Vec<String>,
    pub screen: ScreenSize,
    /// Seconds to wait after starting the viewer.
    pub wait: u64,
    /// Seconds to poll for a rendered frame.
    pub timeout: u64,
    pub bgcolor: String,
    pub visible: bool,
    pub alt: Option<String>,
    /// Generic image options (`width`, `align`, ...) passed through unchanged.
    pub image_options: BTreeMap<String, String>,
    /// Nodes appended while visiting, e.g. the image a LaTeX build places.
    pub children: Vec<ImageNode>,
}

impl EmbedNode {
    /// A node with default options for the given trace files.
    pub fn new(trace_files: Vec<String>) -> Self {
        Self {
            trace_files,
            screen: DEFAULT_SCREEN,
            wait: DEFAULT_WAIT,
            timeout: DEFAULT_TIMEOUT,
            bgcolor: DEFAULT_BGCOLOR.to_string(),
            visible: false,
            alt: None,
            image_options: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Alt text, falling back to the trace file list.
    pub fn alt_text(&self) -> String {
        self.alt
            .clone()
            .unwrap_or_else(|| self.trace_files.join(" "))
    }
}

/// A generic image reference, rendered by the host's default image path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNode {
    pub uri: String,
    pub alt: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl ImageNode {
    /// Image for `uri` carrying the node's public attributes.
    pub fn from_embed(uri: impl Into<String>, node: &EmbedNode) -> Self {
        Self {
            uri: uri.into(),
            alt: node.alt.clone(),
            options: node.image_options.clone(),
        }
    }
}
