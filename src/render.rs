//! Turning an [`EmbedNode`] into an image asset.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::capture::CaptureRequest;
use crate::error::Result;
use crate::extension::{BuildContext, Builder};
use crate::node::EmbedNode;

/// Adds every signal of the dump and zooms to the full time range.
pub const SELECT_ALL_TCL: &str = r#"set clk48 [list]

set nfacs [ gtkwave::getNumFacs ]
for {set i 0} {$i < $nfacs } {incr i} {
set facname [ gtkwave::getFacName $i ]

set fields [split $facname "\\"]
set sig1 [ lindex $fields 0 ]
set sig2 [ lindex $fields 1 ]
if {[llength $fields]  == 2} {
set sig "$sig2"
} else {
set sig "$sig1"
}

lappend clk48 "$sig"
}

set num_added [ gtkwave::addSignalsFromList $clk48 ]

set max_time [ gtkwave::getMaxTime ]
set min_time [ gtkwave::getMinTime ]

gtkwave::setZoomRangeTimes $min_time $max_time
"#;

/// Appended when several trace files are shown at once.
pub const LEFT_JUSTIFY_TCL: &str = "gtkwave::setLeftJustifySigs on\n";

/// Run-control settings: no splash, no signal tree, no saved window position.
pub const RC: &str = "hide_sst 1
splash_disable 1
enable_vert_grid 0
ignore_savefile_pos 1
";

/// Automation script for the given number of trace files.
pub fn tcl_script(trace_count: usize) -> String {
    if trace_count > 1 {
        format!("{SELECT_ALL_TCL}\n{LEFT_JUSTIFY_TCL}")
    } else {
        SELECT_ALL_TCL.to_string()
    }
}

/// Hex digest identifying a trace file list.
///
/// Only the paths are hashed, so editing a trace file in place keeps its
/// name.
pub fn hash_trace_files(trace_files: &[String]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(trace_files)?);
    hasher.update(b"\0");
    let digest = hasher.finalize();

    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(64);
    for &b in digest.iter() {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    Ok(out)
}

/// Reference used in the output and path the image is written to.
pub fn generate_name(
    builder: &Builder,
    prefix: &str,
    node: &EmbedNode,
    fileformat: &str,
) -> Result<(String, PathBuf)> {
    let key = hash_trace_files(&node.trace_files)?;
    let fname = format!("{prefix}-{key}.{fileformat}");

    Ok(match &builder.imgpath {
        Some(imgpath) => (
            format!("{imgpath}/{fname}"),
            builder.outdir.join("_images").join(&fname),
        ),
        None => (fname.clone(), builder.outdir.join(&fname)),
    })
}

/// Quote a command line so it can be pasted into a POSIX shell.
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            let safe = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
            if safe {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_script(suffix: &str, contents: &str) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("gtkwave")
        .suffix(suffix)
        .tempfile()?;
    file.write_all(contents.as_bytes())?;
    let (_, path) = file.keep().map_err(std::io::Error::from)?;
    Ok(path)
}

/// Render `node` to `output`.
///
/// The control scripts are only removed after a successful capture, so a
/// failed run can be repeated with the logged command line.
pub async fn shoot(
    builder: &Builder,
    ctx: &BuildContext,
    node: &EmbedNode,
    output: &Path,
) -> Result<()> {
    let tcl = write_script(".tcl", &tcl_script(node.trace_files.len()))?;
    let rc = write_script(".rc", RC)?;

    let mut command = vec![ctx.settings.viewer.clone()];
    command.extend(
        node.trace_files
            .iter()
            .map(|f| builder.srcdir.join(f).to_string_lossy().into_owned()),
    );
    command.extend([
        "--tcl_init".to_string(),
        tcl.to_string_lossy().into_owned(),
        "--rcfile".to_string(),
        rc.to_string_lossy().into_owned(),
        "--nomenu".to_string(),
    ]);

    info!("running: {}", shell_join(&command));

    let request = CaptureRequest {
        command,
        output: output.to_path_buf(),
        wait: Duration::from_secs(node.wait),
        timeout: Duration::from_secs(node.timeout),
        screen: node.screen,
        visible: node.visible,
        bgcolor: node.bgcolor.clone(),
    };
    let process = ctx.capture.capture(&request).await?;
    debug!(stdout = %process.stdout, stderr = %process.stderr, "viewer output");

    std::fs::remove_file(&tcl)?;
    std::fs::remove_file(&rc)?;
    Ok(())
}

/// Render `node` to its content-addressed location and return
/// `(reference, output path)`.
pub async fn render_gtkwave(
    builder: &Builder,
    ctx: &BuildContext,
    node: &EmbedNode,
) -> Result<(String, PathBuf)> {
    let (refname, outfname) = generate_name(builder, &ctx.settings.image_prefix, node, "png")?;
    shoot(builder, ctx, node, &outfname).await?;
    Ok((refname, outfname))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Backend;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hash_is_stable_and_order_sensitive() {
        let ab = hash_trace_files(&files(&["a", "b"])).unwrap();
        assert_eq!(ab, hash_trace_files(&files(&["a", "b"])).unwrap());
        assert_eq!(ab.len(), 64);
        assert_ne!(ab, hash_trace_files(&files(&["b", "a"])).unwrap());
        assert_ne!(ab, hash_trace_files(&files(&["a", "c"])).unwrap());
        assert_ne!(ab, hash_trace_files(&files(&["ab"])).unwrap());
    }

    #[test]
    fn test_generate_name_html_and_latex() {
        let node = EmbedNode::new(files(&["wave.vcd"]));
        let key = hash_trace_files(&node.trace_files).unwrap();

        let html = Builder::new(Backend::Html, "/src", "/out");
        let (refname, outfname) = generate_name(&html, "gtkwave", &node, "png").unwrap();
        assert_eq!(refname, format!("_images/gtkwave-{key}.png"));
        assert_eq!(outfname, PathBuf::from(format!("/out/_images/gtkwave-{key}.png")));

        let latex = Builder::new(Backend::Latex, "/src", "/out");
        let (refname, outfname) = generate_name(&latex, "gtkwave", &node, "png").unwrap();
        assert_eq!(refname, format!("gtkwave-{key}.png"));
        assert_eq!(outfname, PathBuf::from(format!("/out/gtkwave-{key}.png")));
    }

    #[test]
    fn test_tcl_script_variants() {
        let single = tcl_script(1);
        assert!(single.contains("gtkwave::addSignalsFromList"));
        assert!(!single.contains("setLeftJustifySigs"));

        let multi = tcl_script(2);
        assert!(multi.contains("gtkwave::addSignalsFromList"));
        assert!(multi.trim_end().ends_with("gtkwave::setLeftJustifySigs on"));
    }

    #[test]
    fn test_shell_join() {
        let args = files(&["gtkwave", "/a b/x.vcd", "--nomenu", "it's"]);
        assert_eq!(
            shell_join(&args),
            r#"gtkwave '/a b/x.vcd' --nomenu 'it'\''s'"#
        );
    }

    #[test]
    fn test_write_script_persists() {
        let path = write_script(".rc", RC).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), RC);
        assert!(path.to_string_lossy().ends_with(".rc"));
        std::fs::remove_file(path).unwrap();
    }
}
