//! gtkwave-embed CLI - GtkWave screenshots for documentation.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gtkwave_embed::display::ScreenSize;
use gtkwave_embed::extension::{self, BuildContext};
use gtkwave_embed::node::{DEFAULT_BGCOLOR, DEFAULT_TIMEOUT, DEFAULT_WAIT};
use gtkwave_embed::prelude::*;
use gtkwave_embed::render;
use tracing::info;

#[derive(Parser)]
#[command(name = "gtkwave-embed")]
#[command(author, version, about = "Embed GtkWave screenshots into documentation")]
struct Cli {
    /// Settings file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one screenshot of the given trace files
    Shot {
        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Virtual screen size
        #[arg(long, default_value = "1024x768")]
        screen: ScreenSize,

        /// Seconds to wait after starting the viewer
        #[arg(long, default_value_t = DEFAULT_WAIT)]
        wait: u64,

        /// Seconds to poll for a rendered waveform
        #[arg(long, default_value_t = DEFAULT_TIMEOUT)]
        timeout: u64,

        /// Root window color (black or white)
        #[arg(long, default_value = DEFAULT_BGCOLOR)]
        bgcolor: String,

        /// Show the display instead of running off-screen
        #[arg(long)]
        visible: bool,

        /// Trace files to open
        #[arg(required = true)]
        traces: Vec<String>,
    },

    /// Replace gtkwave directives in documents with rendered output
    Build {
        /// Output backend
        #[arg(long, default_value = "html")]
        backend: Backend,

        /// Source root the documents live in
        #[arg(long, default_value = ".")]
        srcdir: PathBuf,

        /// Output directory
        #[arg(long)]
        outdir: PathBuf,

        /// Documents to build
        #[arg(required = true)]
        documents: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Shot {
            output,
            screen,
            wait,
            timeout,
            bgcolor,
            visible,
            traces,
        } => {
            let mut node = EmbedNode::new(traces);
            node.screen = screen;
            node.wait = wait;
            node.timeout = timeout;
            node.bgcolor = bgcolor;
            node.visible = visible;

            let outdir = output.parent().unwrap_or(Path::new(".")).to_path_buf();
            let builder = Builder::new(Backend::Html, ".", outdir);
            let ctx = BuildContext::new(settings);
            render::shoot(&builder, &ctx, &node, &output).await?;
            eprintln!("Screenshot saved to: {}", output.display());
        }
        Commands::Build {
            backend,
            srcdir,
            outdir,
            documents,
        } => {
            build_documents(settings, backend, &srcdir, &outdir, &documents).await?;
        }
    }

    Ok(())
}

async fn build_documents(
    settings: Settings,
    backend: Backend,
    srcdir: &Path,
    outdir: &Path,
    documents: &[PathBuf],
) -> Result<()> {
    let mut app = App::new();
    extension::setup(&mut app);
    let build = app.start_build(Builder::new(backend, srcdir, outdir), settings)?;

    for path in documents {
        let docname = docname(srcdir, path);
        let source = fs::read_to_string(path)?;
        let doc = DocContext::new(srcdir, docname.clone());

        let rendered = build.render_document(&doc, &source).await?;

        let target = outdir.join(format!("{docname}.{}", backend.extension()));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, rendered)?;
        info!(document = %docname, output = %target.display(), "wrote document");
    }

    Ok(())
}

/// Document name: path below the source root, without extension.
fn docname(srcdir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(srcdir).unwrap_or(path).with_extension("");
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
