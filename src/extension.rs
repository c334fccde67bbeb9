//! Registration with the documentation build.
//!
//! The host build is modelled as an [`App`] holding directive parsers, node
//! visitors keyed by backend, and `builder-inited` listeners. [`setup`] wires
//! the `gtkwave` directive into it.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::capture::{Capture, XvfbCapture};
use crate::config::Settings;
use crate::directive::{self, DIRECTIVE_NAME};
use crate::document::{DirectiveBlock, DocContext, Segment, scan};
use crate::error::{GtkwaveError, Result};
use crate::node::EmbedNode;
use crate::visitors::{
    html_visit_gtkwave, image_markup, latex_depart_gtkwave, latex_visit_gtkwave,
};

/// Node type name of [`EmbedNode`].
pub const EMBED_NODE: &str = "gtkwave";

/// Boxed future returned by node visitors.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Parses a directive block into a node.
pub type DirectiveFn = fn(&DirectiveBlock, &DocContext) -> Result<EmbedNode>;

/// Called when a node is entered.
pub type VisitFn = for<'a> fn(&'a mut Translator, &'a mut EmbedNode) -> BoxFuture<'a, Result<Visit>>;

/// Called when a node is left.
pub type DepartFn = fn(&mut Translator, &EmbedNode);

/// Creates the per-build context once the builder exists.
pub type BuilderInitedFn = fn(&Builder, Settings) -> BuildContext;

/// Output backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Html,
    Latex,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Html => "html",
            Backend::Latex => "latex",
        }
    }

    /// Extension of documents written by this backend.
    pub fn extension(self) -> &'static str {
        match self {
            Backend::Html => "html",
            Backend::Latex => "tex",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Backend::Html),
            "latex" | "tex" => Ok(Backend::Latex),
            _ => Err(format!("Unknown backend: {}. Use html or latex", s)),
        }
    }
}

/// The active builder.
#[derive(Debug, Clone)]
pub struct Builder {
    pub backend: Backend,
    pub srcdir: PathBuf,
    pub outdir: PathBuf,
    /// Public image directory; only builders that copy images have one.
    pub imgpath: Option<String>,
}

impl Builder {
    pub fn new(backend: Backend, srcdir: impl Into<PathBuf>, outdir: impl Into<PathBuf>) -> Self {
        let imgpath = match backend {
            Backend::Html => Some("_images".to_string()),
            Backend::Latex => None,
        };
        Self {
            backend,
            srcdir: srcdir.into(),
            outdir: outdir.into(),
            imgpath,
        }
    }
}

/// State shared by every render of one build.
pub struct BuildContext {
    pub settings: Settings,
    pub capture: Arc<dyn Capture>,
}

impl BuildContext {
    pub fn new(settings: Settings) -> Self {
        let capture = Arc::new(XvfbCapture::new(settings.display.clone()));
        Self { settings, capture }
    }
}

/// What the host does after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Render children with the default path, then depart.
    Continue,
    /// The visitor wrote everything.
    SkipNode,
}

/// Visitor pair for one backend.
#[derive(Clone, Copy)]
pub struct NodeVisitors {
    pub visit: VisitFn,
    pub depart: Option<DepartFn>,
}

/// Output being written for one node.
pub struct Translator {
    pub builder: Builder,
    pub context: Arc<BuildContext>,
    pub body: Vec<String>,
}

/// Registry of everything extensions contribute.
#[derive(Default)]
pub struct App {
    directives: HashMap<String, DirectiveFn>,
    nodes: HashMap<String, HashMap<Backend, NodeVisitors>>,
    builder_inited: Vec<BuilderInitedFn>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directive(&mut self, name: &str, parse: DirectiveFn) {
        self.directives.insert(name.to_string(), parse);
    }

    pub fn add_node(&mut self, name: &str, visitors: &[(Backend, NodeVisitors)]) {
        self.nodes
            .entry(name.to_string())
            .or_default()
            .extend(visitors.iter().copied());
    }

    pub fn connect_builder_inited(&mut self, listener: BuilderInitedFn) {
        self.builder_inited.push(listener);
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// Fire `builder-inited` and start a build.
    pub fn start_build(&self, builder: Builder, settings: Settings) -> Result<Build<'_>> {
        let listener = self.builder_inited.last().ok_or_else(|| {
            GtkwaveError::Config("no extension connected to builder-inited".to_string())
        })?;
        let context = listener(&builder, settings);
        debug!(backend = %builder.backend, outdir = %builder.outdir.display(), "builder initialized");
        Ok(Build {
            app: self,
            builder,
            context: Arc::new(context),
        })
    }
}

/// A build in progress.
pub struct Build<'app> {
    app: &'app App,
    builder: Builder,
    context: Arc<BuildContext>,
}

impl Build<'_> {
    /// Replace how screenshots are produced for this build.
    pub fn with_capture(mut self, capture: Arc<dyn Capture>) -> Self {
        let settings = self.context.settings.clone();
        self.context = Arc::new(BuildContext { settings, capture });
        self
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// Replace every registered directive in `source` with rendered markup.
    pub async fn render_document(&self, doc: &DocContext, source: &str) -> Result<String> {
        let mut out = String::new();

        for segment in scan(source) {
            let block = match segment {
                Segment::Text(text) => {
                    out.push_str(&text);
                    continue;
                }
                Segment::Directive(block) => block,
            };
            let Some(parse) = self.app.directives.get(&block.name) else {
                out.push_str(&block.raw);
                continue;
            };

            let mut node = parse(&block, doc)?;
            let visitors = self
                .app
                .nodes
                .get(EMBED_NODE)
                .and_then(|by_backend| by_backend.get(&self.builder.backend))
                .copied()
                .ok_or_else(|| {
                    GtkwaveError::Config(format!(
                        "no {} visitor registered for {EMBED_NODE}",
                        self.builder.backend
                    ))
                })?;

            let mut translator = Translator {
                builder: self.builder.clone(),
                context: self.context.clone(),
                body: Vec::new(),
            };
            if (visitors.visit)(&mut translator, &mut node).await? == Visit::Continue {
                for child in &node.children {
                    translator
                        .body
                        .push(image_markup(self.builder.backend, child));
                }
                if let Some(depart) = visitors.depart {
                    depart(&mut translator, &node);
                }
            }
            out.push_str(&translator.body.concat());
        }

        Ok(out)
    }
}

fn on_builder_inited(_builder: &Builder, settings: Settings) -> BuildContext {
    BuildContext::new(settings)
}

/// Register the `gtkwave` directive, its node and its build hook.
pub fn setup(app: &mut App) {
    app.add_node(
        EMBED_NODE,
        &[
            (
                Backend::Html,
                NodeVisitors {
                    visit: html_visit_gtkwave,
                    depart: None,
                },
            ),
            (
                Backend::Latex,
                NodeVisitors {
                    visit: latex_visit_gtkwave,
                    depart: Some(latex_depart_gtkwave),
                },
            ),
        ],
    );
    app.add_directive(DIRECTIVE_NAME, directive::parse);
    app.connect_builder_inited(on_builder_inited);
}
