//! RC-002: Placeholder grammar.
//!
//! A template is literal text interleaved with `<name>` placeholders. Names
//! are `[A-Za-z_][A-Za-z0-9_-]*`, optionally dotted (`<paths.data_root>`).
//! A `<` that does not open a well-formed placeholder is literal text, so
//! vocabulary tokens such as `<sos/eos>` pass through untouched. A `<name`
//! running to the end of the string is rejected as unterminated.
//!
//! Tokens that do match the grammar (`<unk>`, `<blank>`, `<space>`) are
//! placeholders. Write them with a doubled opener (`<<unk>`) to keep the
//! literal text `<unk>`.
//!
//! Explicit `!ref` templates are parsed strictly: they must contain at least
//! one placeholder, and any `<` followed by a name character must close as a
//! placeholder or be escaped, so `<data_root/wav` is rejected.
//!
//! Rendering joins pieces path-style: where a substituted value and its
//! neighbouring literal meet on a `/` from both sides, one slash is dropped,
//! so `datasets/` + `/ljspeech` renders as `datasets/ljspeech`.
//!
//! Templates are parsed once, when the document is parsed, and stored on the
//! reference node.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<?)<([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z_][A-Za-z0-9_-]*)*)>")
        .expect("placeholder pattern is valid")
});

static UNTERMINATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[A-Za-z_][A-Za-z0-9_.-]*\z").expect("unterminated pattern is valid")
});

static DANGLING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z_][^\s<>]*").expect("dangling pattern is valid"));

/// A dotted variable path inside a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarPath {
    parts: Vec<String>,
}

impl VarPath {
    /// Parse `a.b.c`. Callers are expected to pass text matched by the grammar.
    pub fn new(dotted: &str) -> Self {
        Self {
            parts: dotted.split('.').map(str::to_string).collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(VarPath),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template. Fails only on an unterminated trailing placeholder.
    pub fn parse(source: &str) -> Result<Self, String> {
        Self::scan(source, false)
    }

    /// Parse the template of an explicit `!ref`.
    pub fn parse_reference(source: &str) -> Result<Self, String> {
        let template = Self::scan(source, true)?;
        if !template.has_placeholders() {
            return Err(format!("reference \"{}\" names no placeholder", source));
        }
        Ok(template)
    }

    fn scan(source: &str, strict: bool) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let gap = &source[last..whole.start()];
            if strict {
                check_dangling(gap, source)?;
            }
            push_literal(&mut segments, gap);
            if caps.get(1).is_some_and(|m| !m.is_empty()) {
                push_literal(&mut segments, &whole.as_str()[1..]);
            } else {
                segments.push(Segment::Placeholder(VarPath::new(name.as_str())));
            }
            last = whole.end();
        }

        let tail = &source[last..];
        if let Some(m) = UNTERMINATED.find(tail) {
            return Err(format!(
                "unterminated placeholder '{}' in \"{}\"",
                m.as_str(),
                source
            ));
        }
        if strict {
            check_dangling(tail, source)?;
        }
        push_literal(&mut segments, tail);

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original text, placeholders included.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_placeholders(&self) -> bool {
        self.placeholders().next().is_some()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &VarPath> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// The text of a template without placeholders, escapes applied.
    pub fn literal(&self) -> Option<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(_) => return None,
            }
        }
        Some(out)
    }

    /// The placeholder, when the whole template is exactly one placeholder.
    pub fn single_placeholder(&self) -> Option<&VarPath> {
        match self.segments.as_slice() {
            [Segment::Placeholder(p)] => Some(p),
            _ => None,
        }
    }

    /// Concatenate literal text with the values produced by `lookup`.
    pub fn render<E, F>(&self, mut lookup: F) -> Result<String, E>
    where
        F: FnMut(&VarPath) -> Result<String, E>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => join_path_piece(&mut out, text),
                Segment::Placeholder(var) => join_path_piece(&mut out, &lookup(var)?),
            }
        }
        Ok(out)
    }
}

fn push_literal(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(Segment::Literal(prev)) => prev.push_str(text),
        _ => segments.push(Segment::Literal(text.to_string())),
    }
}

fn check_dangling(text: &str, source: &str) -> Result<(), String> {
    match DANGLING.find(text) {
        Some(m) => Err(format!(
            "unterminated placeholder '{}' in \"{}\"",
            m.as_str(),
            source
        )),
        None => Ok(()),
    }
}

fn join_path_piece(out: &mut String, piece: &str) {
    match piece.strip_prefix('/') {
        Some(rest) if out.ends_with('/') => out.push_str(rest),
        _ => out.push_str(piece),
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
