//! Parsed view of one Elm source file.
//!
//! A [`SourceTree`] keeps the file's text, a line index for offset to
//! line/column conversion, and the parsed module header. Headers come in
//! three forms:
//!
//! ```text
//! module Page.Home exposing (view, Msg(..))
//! port module Alarms exposing (..)
//! effect module Task where { command = MyCmd } exposing (Task)
//! ```
//!
//! Parsing is tolerant: a file that is mid-edit still yields as much of a
//! header as can be read, and a file with no recognizable header simply
//! has none.

// Offsets are byte positions in a single source file; u32 is plenty.
#![allow(clippy::cast_possible_truncation)]

/// A 1-indexed line/column pair. Columns count bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Byte offsets of line starts, for offset to [`Location`] conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx as u32 + 1);
            }
        }
        Self { line_starts }
    }

    fn location(&self, offset: u32) -> Location {
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let start = self.line_starts[line - 1];
        Location {
            line: line as u32,
            column: offset - start + 1,
        }
    }
}

/// The flavor of a module declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Plain,
    Port,
    Effect,
}

/// What a module's header exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exposing {
    /// `exposing (..)`
    All,
    /// An explicit list. Constructor lists collapse to the type name, so
    /// `Msg(..)` is recorded as `Msg`.
    Names(Vec<String>),
}

impl Exposing {
    #[must_use]
    pub fn exposes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Names(names) => names.iter().any(|n| n == name),
        }
    }
}

/// The parsed `module ... exposing ...` line of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
    pub name: String,
    pub kind: ModuleKind,
    pub exposing: Exposing,
}

/// One source file's text plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    text: String,
    lines: LineIndex,
    header: Option<ModuleHeader>,
}

impl SourceTree {
    /// Parses a source file. Never fails; malformed input produces a tree
    /// without a header.
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        let header = parse_header(&text);
        Self {
            text,
            lines,
            header,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn header(&self) -> Option<&ModuleHeader> {
        self.header.as_ref()
    }

    /// The module name declared by the header, if there is one.
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        self.header.as_ref().map(|header| header.name.as_str())
    }

    /// Converts a byte offset to a line/column pair. Offsets past the end
    /// of the text clamp to the end.
    #[must_use]
    pub fn location(&self, offset: usize) -> Location {
        let clamped = offset.min(self.text.len()) as u32;
        self.lines.location(clamped)
    }
}

fn parse_header(text: &str) -> Option<ModuleHeader> {
    let mut scanner = HeaderScanner::new(text);
    scanner.skip_trivia();

    let kind = if scanner.eat_keyword("port") {
        scanner.skip_trivia();
        if !scanner.eat_keyword("module") {
            return None;
        }
        ModuleKind::Port
    } else if scanner.eat_keyword("effect") {
        scanner.skip_trivia();
        if !scanner.eat_keyword("module") {
            return None;
        }
        ModuleKind::Effect
    } else if scanner.eat_keyword("module") {
        ModuleKind::Plain
    } else {
        return None;
    };

    scanner.skip_trivia();
    let name = scanner.module_name()?;
    scanner.skip_trivia();
    if kind == ModuleKind::Effect {
        scanner.skip_where_record();
        scanner.skip_trivia();
    }

    // A missing or unfinished exposing list reads as exposing everything,
    // which keeps files usable while their header is being typed.
    let exposing = if scanner.eat_keyword("exposing") {
        scanner.skip_trivia();
        scanner.exposing_list().unwrap_or(Exposing::All)
    } else {
        Exposing::All
    };

    Some(ModuleHeader {
        name,
        kind,
        exposing,
    })
}

/// Cursor over the prefix of a source file that may hold the header.
struct HeaderScanner<'a> {
    rest: &'a str,
}

impl<'a> HeaderScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    /// Skips whitespace, `--` line comments, and nested `{- -}` block
    /// comments. An unterminated block comment consumes the rest of the
    /// file.
    fn skip_trivia(&mut self) {
        loop {
            let trimmed = self.rest.trim_start();
            if let Some(after) = trimmed.strip_prefix("--") {
                self.rest = match after.find('\n') {
                    Some(end) => &after[end + 1..],
                    None => "",
                };
                continue;
            }
            if trimmed.starts_with("{-") {
                self.rest = skip_block_comment(trimmed);
                continue;
            }
            self.rest = trimmed;
            break;
        }
    }

    /// Consumes `keyword` when it is followed by a word boundary.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(after) = self.rest.strip_prefix(keyword) {
            let at_boundary = after
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric() && c != '_');
            if at_boundary {
                self.rest = after;
                return true;
            }
        }
        false
    }

    /// Consumes a dotted module name. Every segment must start with an
    /// uppercase letter.
    fn module_name(&mut self) -> Option<String> {
        let end = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(self.rest.len());
        let name = &self.rest[..end];
        let well_formed = !name.is_empty()
            && name
                .split('.')
                .all(|segment| segment.chars().next().is_some_and(char::is_uppercase));
        if !well_formed {
            return None;
        }
        self.rest = &self.rest[end..];
        Some(name.to_string())
    }

    /// Consumes the `where { ... }` record of an effect module.
    fn skip_where_record(&mut self) {
        if !self.eat_keyword("where") {
            return;
        }
        self.skip_trivia();
        if let Some(after) = self.rest.strip_prefix('{') {
            self.rest = match after.find('}') {
                Some(end) => &after[end + 1..],
                None => "",
            };
        }
    }

    /// Consumes a parenthesized exposing list. Commas split items at the
    /// top nesting level only, so operator names like `(</>)` and
    /// constructor lists like `Msg(..)` stay intact.
    fn exposing_list(&mut self) -> Option<Exposing> {
        self.rest = self.rest.strip_prefix('(')?;
        let mut depth = 1usize;
        let mut item = String::new();
        let mut names = Vec::new();
        let mut saw_all = false;
        for ch in self.rest.chars() {
            match ch {
                '(' => {
                    depth += 1;
                    item.push(ch);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    item.push(ch);
                }
                ',' if depth == 1 => push_item(&mut names, &mut saw_all, &mut item),
                _ => item.push(ch),
            }
        }
        push_item(&mut names, &mut saw_all, &mut item);
        if saw_all {
            Some(Exposing::All)
        } else {
            Some(Exposing::Names(names))
        }
    }
}

fn push_item(names: &mut Vec<String>, saw_all: &mut bool, item: &mut String) {
    let text = item.trim();
    if text == ".." {
        *saw_all = true;
    } else if !text.is_empty() {
        let name = text.strip_suffix("(..)").unwrap_or(text).trim_end();
        names.push(name.to_string());
    }
    item.clear();
}

/// Skips one block comment, honoring nesting. `text` starts with `{-`.
fn skip_block_comment(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'-') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'}') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return &text[i..];
            }
        } else {
            i += 1;
        }
    }
    ""
}
