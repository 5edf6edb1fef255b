//! The text scanner that turns wikitext into [`Node`]s.
//!
//! A [`Wikifier`] walks its source with a cursor. On each step it finds the
//! nearest match among the formatter table's start patterns and the active
//! terminator (the terminator wins ties), emits the plain text before it,
//! and then either returns (terminator) or hands control to the matching
//! formatter. Formatters may consume further input and recurse by calling
//! [`Wikifier::sub_wikify`] with their own terminator.

pub mod formatters;

pub use formatters::{Formatter, FormatterMatch, FormatterTable};

use crate::history::History;
use crate::macros::{MacroError, MacroRegistry};
use crate::node::{error_node, Node};
use crate::persist::PersistenceStore;
use crate::story::StoryConfig;
use crate::store::Store;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MACRO_PARAM: Regex =
        Regex::new(r#"\s*(?:"([^"]*)"|'([^']*)'|\[\[([^\]]*)\]\]|([^"'\s]\S*))"#).unwrap();
    static ref INLINE_STYLE: Regex = {
        let letter = r"[A-Za-z\x{c0}-\x{de}\x{df}-\x{ff}_0-9\-\x{150}\x{170}\x{151}\x{171}]";
        Regex::new(&format!(
            r"(?:({letter}+)\(([^\)\|\n]+)\):)|(?:({letter}+):([^;\|\n]+);)"
        ))
        .unwrap()
    };
}

/// Everything a render pass reads or writes besides its source text.
pub struct RenderContext<'a> {
    /// Macros may rewrite passage text here; `Story::restart` undoes it.
    pub store: &'a mut Store,
    pub history: &'a mut History,
    pub persistence: &'a mut dyn PersistenceStore,
    pub formatters: &'a FormatterTable,
    pub macros: &'a MacroRegistry,
    pub config: &'a StoryConfig,
    /// Key prefix for remembered values.
    pub persist_prefix: &'a str,
    /// Titles offered by one-shot action links during this pass.
    pub offered_actions: Vec<String>,
    depth: usize,
}

impl<'a> RenderContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &'a mut Store,
        history: &'a mut History,
        persistence: &'a mut dyn PersistenceStore,
        formatters: &'a FormatterTable,
        macros: &'a MacroRegistry,
        config: &'a StoryConfig,
        persist_prefix: &'a str,
    ) -> Self {
        Self {
            store,
            history,
            persistence,
            formatters,
            macros,
            config,
            persist_prefix,
            offered_actions: Vec::new(),
            depth: 0,
        }
    }

    /// Render `source` with a fresh scanner, appending to `out`.
    ///
    /// Nested renders (branches, transclusions, printed values) and nested
    /// formatter scans count against the configured depth limit.
    pub fn render_into(&mut self, out: &mut Vec<Node>, source: &str) -> Result<(), MacroError> {
        let limit = self.config.max_render_depth;
        if self.depth >= limit {
            return Err(MacroError::TooDeep { limit });
        }

        self.depth += 1;
        let mut w = Wikifier::new(source, self);
        w.scan(out, None);
        self.depth -= 1;
        Ok(())
    }

    /// Render `source` into a new node list.
    pub fn render(&mut self, source: &str) -> Result<Vec<Node>, MacroError> {
        let mut out = Vec::new();
        self.render_into(&mut out, source)?;
        Ok(out)
    }

    /// Current nesting depth of render passes.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A scanner over one source string.
pub struct Wikifier<'w, 'a> {
    source: &'w str,
    pub ctx: &'w mut RenderContext<'a>,
    /// Cursor: where the next scan step starts.
    pub next_match: usize,
    /// Start of the most recent formatter or terminator match.
    pub match_start: usize,
    /// Length of the most recent formatter or terminator match.
    pub match_length: usize,
}

impl<'w, 'a> Wikifier<'w, 'a> {
    pub fn new(source: &'w str, ctx: &'w mut RenderContext<'a>) -> Self {
        Self {
            source,
            ctx,
            next_match: 0,
            match_start: 0,
            match_length: 0,
        }
    }

    pub fn source(&self) -> &'w str {
        self.source
    }

    /// Text of the most recent match.
    pub fn match_text(&self) -> &'w str {
        let end = (self.match_start + self.match_length).min(self.source.len());
        self.source.get(self.match_start..end).unwrap_or("")
    }

    /// Scan from the cursor, appending to `out`, until `terminator` matches
    /// or the source is exhausted. On a terminator match the cursor is left
    /// just past it and the match fields describe it.
    ///
    /// Past the depth limit this emits an error and consumes the rest of
    /// the source.
    pub fn sub_wikify(&mut self, out: &mut Vec<Node>, terminator: Option<&Regex>) {
        let limit = self.ctx.config.max_render_depth;
        if self.ctx.depth >= limit {
            out.push(error_node(MacroError::TooDeep { limit }.to_string()));
            self.next_match = self.source.len();
            return;
        }

        self.ctx.depth += 1;
        self.scan(out, terminator);
        self.ctx.depth -= 1;
    }

    fn scan(&mut self, out: &mut Vec<Node>, terminator: Option<&Regex>) {
        let table = self.ctx.formatters;

        loop {
            let formatter_match = table.find_at(self.source, self.next_match);
            let terminator_match =
                terminator.and_then(|t| t.find_at(self.source, self.next_match));

            if let Some(t) = terminator_match {
                if formatter_match.map_or(true, |f| t.start() <= f.start) {
                    self.output_text(out, self.next_match, t.start());
                    self.match_start = t.start();
                    self.match_length = t.len();
                    self.next_match = t.end();
                    return;
                }
            }

            let Some(m) = formatter_match else {
                break;
            };

            self.output_text(out, self.next_match, m.start);
            self.match_start = m.start;
            self.match_length = m.end - m.start;
            self.next_match = m.end;

            let formatter = table.get(m.index);
            let handled = formatter.handle(self, out);
            if !handled {
                // A start pattern with no well-formed construct behind it
                // is ordinary text.
                tracing::trace!(formatter = formatter.name(), at = m.start, "formatter declined");
                self.output_text(out, m.start, m.end);
                self.next_match = m.end;
            } else if self.next_match <= m.start {
                self.next_match = m.end;
            }
        }

        if self.next_match < self.source.len() {
            self.output_text(out, self.next_match, self.source.len());
            self.next_match = self.source.len();
        }
    }

    /// Append `source[start..end]` as text.
    pub fn output_text(&self, out: &mut Vec<Node>, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let Some(text) = self.source.get(start..end) else {
            return;
        };
        match out.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(text),
            _ => out.push(Node::Text(text.to_string())),
        }
    }

    /// Read inline CSS declarations at the cursor: `name(value):` or
    /// `name:value;`, repeated. Advances past what was read.
    pub fn read_inline_styles(&mut self) -> Vec<(String, String)> {
        let mut styles = Vec::new();
        while let Some(caps) = INLINE_STYLE.captures_at(self.source, self.next_match) {
            let whole = match caps.get(0) {
                Some(m) if m.start() == self.next_match => m,
                _ => break,
            };

            let (name, value) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
                (Some(n), Some(v), _, _) | (_, _, Some(n), Some(v)) => (n.as_str(), v.as_str()),
                _ => break,
            };

            let name = match un_dash(name).as_str() {
                "bgcolor" => "backgroundColor".to_string(),
                other => other.to_string(),
            };
            styles.push((name, value.to_string()));
            self.next_match = whole.end();
        }
        styles
    }
}

/// Split a macro argument string into parameters: double-quoted,
/// single-quoted, `[[bracketed]]` or bare segments, delimiters stripped.
/// Empty segments are dropped.
pub fn read_macro_params(args: &str) -> Vec<String> {
    MACRO_PARAM
        .captures_iter(args)
        .filter_map(|caps| {
            (1..=4)
                .filter_map(|i| caps.get(i))
                .map(|m| m.as_str())
                .find(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect()
}

/// `background-color` -> `backgroundColor`.
fn un_dash(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
