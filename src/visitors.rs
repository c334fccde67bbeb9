//! Per-backend visitors for the embed node.

use crate::error::Result;
use crate::extension::{Backend, BoxFuture, Translator, Visit};
use crate::node::{EmbedNode, ImageNode};
use crate::render::render_gtkwave;

/// Escape HTML entities for safe embedding.
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn png_tag(refname: &str, alt: &str) -> String {
    format!(
        "<img src=\"{}\" alt=\"{}\"/>\n",
        escape_html(refname),
        escape_html(alt)
    )
}

/// Render the screenshot and write it as a paragraph-wrapped `<img>`.
pub fn html_visit_gtkwave<'a>(
    t: &'a mut Translator,
    node: &'a mut EmbedNode,
) -> BoxFuture<'a, Result<Visit>> {
    Box::pin(async move {
        let (refname, _) = render_gtkwave(&t.builder, &t.context, node).await?;

        t.body.push("<p class=\"plantuml\">".to_string());
        t.body.push(png_tag(&refname, &node.alt_text()));
        t.body.push("</p>\n".to_string());

        Ok(Visit::SkipNode)
    })
}

/// Render the screenshot and hand an image node to the default image path.
pub fn latex_visit_gtkwave<'a>(
    t: &'a mut Translator,
    node: &'a mut EmbedNode,
) -> BoxFuture<'a, Result<Visit>> {
    Box::pin(async move {
        let (refname, _) = render_gtkwave(&t.builder, &t.context, node).await?;
        let image = ImageNode::from_embed(refname, node);
        node.children.push(image);
        Ok(Visit::Continue)
    })
}

pub fn latex_depart_gtkwave(_t: &mut Translator, _node: &EmbedNode) {}

fn latex_length(value: &str) -> String {
    match value.strip_suffix('%') {
        Some(pct) => match pct.trim().parse::<f64>() {
            Ok(pct) => format!("{}\\linewidth", pct / 100.0),
            Err(_) => value.to_string(),
        },
        None => value.to_string(),
    }
}

/// Default markup for a generic image node.
pub fn image_markup(backend: Backend, image: &ImageNode) -> String {
    match backend {
        Backend::Html => {
            let alt = image.alt.as_deref().unwrap_or("");
            png_tag(&image.uri, alt)
        }
        Backend::Latex => {
            let mut opts = Vec::new();
            if let Some(width) = image.options.get("width") {
                opts.push(format!("width={}", latex_length(width)));
            }
            if let Some(height) = image.options.get("height") {
                opts.push(format!("height={}", latex_length(height)));
            }
            if let Some(scale) = image.options.get("scale") {
                if let Ok(pct) = scale.trim().trim_end_matches('%').parse::<f64>() {
                    opts.push(format!("scale={}", pct / 100.0));
                }
            }
            if opts.is_empty() {
                format!("\\noindent\\includegraphics{{{}}}\n", image.uri)
            } else {
                format!(
                    "\\noindent\\includegraphics[{}]{{{}}}\n",
                    opts.join(","),
                    image.uri
                )
            }
        }
    }
}
