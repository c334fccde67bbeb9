//! Splitting source documents into plain text and directive blocks.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.\s+([A-Za-z][\w-]*)::(?:\s+(.*))?$").unwrap());

static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+:([A-Za-z][\w-]*):(?:\s+(.*))?$").unwrap());

/// A source document being built.
#[derive(Debug, Clone)]
pub struct DocContext {
    /// Source root of the project.
    pub srcdir: PathBuf,
    /// Document name relative to the source root, without extension.
    pub docname: String,
}

impl DocContext {
    pub fn new(srcdir: impl Into<PathBuf>, docname: impl Into<String>) -> Self {
        Self {
            srcdir: srcdir.into(),
            docname: docname.into(),
        }
    }

    /// Resolve a path written in this document.
    ///
    /// Paths starting with `/` are relative to the source root, everything
    /// else to the document's directory. Returns the source-relative path
    /// (with `/` separators) and the absolute path.
    pub fn relfn2path(&self, filename: &str) -> (String, PathBuf) {
        let rel = match filename.strip_prefix('/') {
            Some(rooted) => rooted.to_string(),
            None => match self.docname.rsplit_once('/') {
                Some((docdir, _)) => format!("{docdir}/{filename}"),
                None => filename.to_string(),
            },
        };
        let rel = normalize(&rel);
        let abs = self.srcdir.join(&rel);
        (rel, abs)
    }
}

/// Lexically normalize a `/`-separated relative path.
fn normalize(path: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// A directive block as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveBlock {
    pub name: String,
    pub argument: String,
    /// Options in source order.
    pub options: Vec<(String, String)>,
    /// Indented body lines, if any.
    pub content: Vec<String>,
    /// 1-based line of the directive marker.
    pub line: usize,
    /// The block exactly as written, for passing unknown directives through.
    pub raw: String,
}

/// A piece of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Directive(DirectiveBlock),
}

fn is_indented(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}

/// Split `source` into text and directive blocks.
pub fn scan(source: &str) -> Vec<Segment> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let Some(caps) = DIRECTIVE_RE.captures(line.trim_end_matches(['\r', '\n'])) else {
            text.push_str(line);
            i += 1;
            continue;
        };

        if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
        }

        let start = i;
        let mut block = DirectiveBlock {
            name: caps[1].to_string(),
            argument: caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            options: Vec::new(),
            content: Vec::new(),
            line: i + 1,
            raw: String::new(),
        };
        i += 1;

        while i < lines.len() {
            let trimmed = lines[i].trim_end_matches(['\r', '\n']);
            let Some(caps) = OPTION_RE.captures(trimmed) else {
                break;
            };
            block.options.push((
                caps[1].to_string(),
                caps.get(2).map_or("", |m| m.as_str()).trim().to_string(),
            ));
            i += 1;
        }

        // Body: indented lines, possibly separated from the options by blanks.
        let mut j = i;
        while j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }
        if j < lines.len() && is_indented(lines[j]) {
            i = j;
            while i < lines.len() && (is_indented(lines[i]) || lines[i].trim().is_empty()) {
                if is_indented(lines[i]) {
                    block.content.push(lines[i].trim().to_string());
                }
                i += 1;
            }
        }

        block.raw = lines[start..i].concat();
        segments.push(Segment::Directive(block));
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}
