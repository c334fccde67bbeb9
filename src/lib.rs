//! # gtkwave-embed
//!
//! Embed GtkWave screenshots of waveform traces into generated documentation.
//!
//! A `gtkwave` directive names one or more trace files. At build time the
//! viewer is started on an off-screen X display, the screen is grabbed until
//! the waveform has rendered, and the signal area is cropped and saved as a
//! PNG named after the trace list. HTML output gets an `<img>` tag, LaTeX
//! output an `\includegraphics`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gtkwave_embed::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut app = App::new();
//!     gtkwave_embed::extension::setup(&mut app);
//!
//!     let builder = Builder::new(Backend::Html, "docs", "_build/html");
//!     let build = app.start_build(builder, Settings::default())?;
//!
//!     let doc = DocContext::new("docs", "index");
//!     let html = build
//!         .render_document(&doc, ".. gtkwave:: counter.vcd\n   :wait: 0\n")
//!         .await?;
//!     println!("{html}");
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`directive`]: directive options into an [`EmbedNode`]
//! - [`render`]: control scripts, asset naming and the render dispatcher
//! - [`capture`]: viewer + virtual display + screenshot polling
//! - [`bbox`]: frame acceptance and cropping
//! - [`visitors`]: HTML and LaTeX output
//! - [`extension`]: registration with the build
//! - [`config`]: settings file

pub mod bbox;
pub mod capture;
pub mod config;
pub mod directive;
pub mod display;
pub mod document;
pub mod error;
pub mod extension;
pub mod node;
pub mod process;
pub mod render;
pub mod visitors;

pub mod prelude;

// Re-export main types at crate root
pub use error::{GtkwaveError, Result};
pub use extension::{App, Backend, Builder};
pub use node::EmbedNode;
