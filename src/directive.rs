//! The `gtkwave` directive: arguments and options into an [`EmbedNode`].

use std::collections::BTreeSet;

use crate::display::ScreenSize;
use crate::document::{DirectiveBlock, DocContext};
use crate::error::{GtkwaveError, Result};
use crate::node::EmbedNode;

/// Name the directive is registered under.
pub const DIRECTIVE_NAME: &str = "gtkwave";

/// How an option value is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Any string, kept as written.
    Unchanged,
    /// An integer `>= 0`.
    NonNegativeInt,
    /// No value allowed.
    Flag,
}

/// Options of the generic image directive, passed through to the image.
pub const IMAGE_OPTIONS: &[(&str, OptionKind)] = &[
    ("alt", OptionKind::Unchanged),
    ("height", OptionKind::Unchanged),
    ("width", OptionKind::Unchanged),
    ("scale", OptionKind::Unchanged),
    ("align", OptionKind::Unchanged),
    ("name", OptionKind::Unchanged),
    ("class", OptionKind::Unchanged),
    ("target", OptionKind::Unchanged),
    ("loading", OptionKind::Unchanged),
];

/// Options controlling the viewer and the virtual display.
pub const GTKWAVE_OPTIONS: &[(&str, OptionKind)] = &[
    ("screen", OptionKind::Unchanged),
    ("wait", OptionKind::NonNegativeInt),
    ("visible", OptionKind::Flag),
    ("timeout", OptionKind::NonNegativeInt),
    ("bgcolor", OptionKind::Unchanged),
];

fn option_kind(name: &str) -> Option<OptionKind> {
    GTKWAVE_OPTIONS
        .iter()
        .chain(IMAGE_OPTIONS)
        .find(|(n, _)| *n == name)
        .map(|(_, kind)| *kind)
}

fn non_negative(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Parse one directive block. Performs no I/O.
pub fn parse(block: &DirectiveBlock, doc: &DocContext) -> Result<EmbedNode> {
    let err = |message: String| {
        GtkwaveError::directive(
            DIRECTIVE_NAME,
            format!("{}:{}: {message}", doc.docname, block.line),
        )
    };

    if block.argument.trim().is_empty() {
        return Err(err("1 argument required (trace files), 0 supplied".to_string()));
    }
    if !block.content.is_empty() {
        return Err(err("no content permitted".to_string()));
    }

    let trace_files = block
        .argument
        .split_whitespace()
        .map(|f| doc.relfn2path(f).0)
        .collect();
    let mut node = EmbedNode::new(trace_files);

    let mut seen = BTreeSet::new();
    for (name, value) in &block.options {
        let Some(kind) = option_kind(name) else {
            return Err(err(format!("unknown option: {name:?}")));
        };
        if !seen.insert(name.as_str()) {
            return Err(err(format!("duplicate option: {name:?}")));
        }

        match (name.as_str(), kind) {
            (_, OptionKind::Flag) if !value.is_empty() => {
                return Err(err(format!("option {name} takes no value, got {value:?}")));
            }
            ("screen", _) => {
                node.screen = value
                    .parse::<ScreenSize>()
                    .map_err(|e| err(format!("option screen: {e}")))?;
            }
            ("wait" | "timeout", _) => {
                let seconds = non_negative(value).ok_or_else(|| {
                    err(format!(
                        "option {name}: expected a non-negative integer, got {value:?}"
                    ))
                })?;
                if name == "wait" {
                    node.wait = seconds;
                } else {
                    node.timeout = seconds;
                }
            }
            ("bgcolor", _) => node.bgcolor = value.clone(),
            ("visible", _) => node.visible = true,
            ("alt", _) => node.alt = Some(value.clone()),
            _ => {
                node.image_options.insert(name.clone(), value.clone());
            }
        }
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Segment, scan};

    fn block(source: &str) -> DirectiveBlock {
        match scan(source).into_iter().next() {
            Some(Segment::Directive(block)) => block,
            other => panic!("expected directive, got {other:?}"),
        }
    }

    fn doc() -> DocContext {
        DocContext::new("/project/docs", "hw/counter")
    }

    #[test]
    fn test_defaults() {
        let node = parse(&block(".. gtkwave:: counter.vcd\n"), &doc()).unwrap();
        assert_eq!(node.trace_files, vec!["hw/counter.vcd"]);
        assert_eq!(
            node.screen,
            ScreenSize {
                width: 1024,
                height: 768
            }
        );
        assert_eq!(node.wait, 1);
        assert_eq!(node.timeout, 12);
        assert_eq!(node.bgcolor, "white");
        assert!(!node.visible);
        assert!(node.alt.is_none());
    }

    #[test]
    fn test_all_options() {
        let source = ".. gtkwave:: a.vcd /shared/b.vcd\n   :screen: 800x600\n   :wait: 0\n   :timeout: 5\n   :bgcolor: black\n   :visible:\n   :alt: Two traces\n   :width: 80%\n";
        let node = parse(&block(source), &doc()).unwrap();
        assert_eq!(node.trace_files, vec!["hw/a.vcd", "shared/b.vcd"]);
        assert_eq!(
            node.screen,
            ScreenSize {
                width: 800,
                height: 600
            }
        );
        assert_eq!(node.wait, 0);
        assert_eq!(node.timeout, 5);
        assert_eq!(node.bgcolor, "black");
        assert!(node.visible);
        assert_eq!(node.alt.as_deref(), Some("Two traces"));
        assert_eq!(node.image_options.get("width").map(String::as_str), Some("80%"));
    }

    #[test]
    fn test_missing_argument() {
        let err = parse(&block(".. gtkwave::\n"), &doc()).unwrap_err();
        assert!(err.to_string().contains("argument"));
    }

    #[test]
    fn test_rejects_bad_options() {
        for source in [
            ".. gtkwave:: a.vcd\n   :wait: -1\n",
            ".. gtkwave:: a.vcd\n   :timeout: soon\n",
            ".. gtkwave:: a.vcd\n   :screen: big\n",
            ".. gtkwave:: a.vcd\n   :visible: yes\n",
            ".. gtkwave:: a.vcd\n   :zoom: 2\n",
            ".. gtkwave:: a.vcd\n   :wait: 1\n   :wait: 2\n",
        ] {
            let err = parse(&block(source), &doc()).unwrap_err();
            assert!(
                matches!(err, GtkwaveError::Directive { .. }),
                "{source:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_bad_integer_errors_carry_location() {
        let err = parse(&block(".. gtkwave:: a.vcd\n   :timeout: soon\n"), &doc()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("hw/counter:"), "{text}");
        assert!(text.contains("option timeout"), "{text}");
    }

    #[test]
    fn test_rejects_content() {
        let err = parse(&block(".. gtkwave:: a.vcd\n\n   stray body\n"), &doc()).unwrap_err();
        assert!(err.to_string().contains("no content"));
    }
}
