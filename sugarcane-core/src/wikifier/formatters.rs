//! The formatter table: ordered start patterns and their handlers.
//!
//! All start patterns are joined into one alternation, so at any offset
//! the earliest-declared formatter wins. Patterns are compiled in
//! multi-line mode: `^` and `$` match at line boundaries.

use super::{read_macro_params, Wikifier};
use crate::node::{Element, Link, Node, Tag};
use crate::store::Store;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use std::fmt;

lazy_static! {
    static ref NEWLINE: Regex = Regex::new(r"\n").unwrap();

    static ref TABLE_ROW: Regex = Regex::new(r"(?m)^\|([^\n]*)\|([fhc]?)$").unwrap();
    static ref TABLE_ROW_END: Regex = Regex::new(r"(?m)\|(?:[fhc]?)$\n?").unwrap();
    static ref TABLE_CELL: Regex =
        Regex::new(r"(?m)(?:\|([^\n\|]*)\|)|(\|[fhc]?$\n?)").unwrap();
    static ref TABLE_CELL_END: Regex = Regex::new(r"(?:\x20*)\|").unwrap();

    static ref MONOSPACED_LINES: Regex =
        Regex::new(r"(?m)^\{\{\{\n((?:^[^\n]*\n)+?)(^\}\}\}$\n?)").unwrap();
    static ref MONOSPACED_PLUGIN_LINES: Regex =
        Regex::new(r"(?m)^//\{\{\{\n\n*((?:^[^\n]*\n)+?)(\n*^//\}\}\}$\n?)").unwrap();
    static ref PLUGIN_COMMENT_END: Regex = Regex::new(r"(?m)^\*\*\*/\n").unwrap();
    static ref QUOTE_BLOCK_END: Regex = Regex::new(r"(?m)^<<<\n").unwrap();
    static ref QUOTE_LINE: Regex = Regex::new(r"(?m)^>+").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r"(?m)^(?:(\*+)|(#+))").unwrap();

    static ref PRETTY_LINK: Regex =
        Regex::new(r"\[\[([^\|\]]*?)(?:(\]\])|(\|(.*?)\]\]))").unwrap();
    static ref IMAGE: Regex = Regex::new(
        r"\[([<]?)([>]?)[Ii][Mm][Gg]\[(?:([^\|\]]+)\|)?([^\[\]\|]+)\](?:\[([^\]]*)\]?)?(\])"
    )
    .unwrap();
    static ref MACRO: Regex = Regex::new(r"<<([^>\s]+)(?:\s*)([^>]*)>>").unwrap();
    static ref HTML: Regex =
        Regex::new(r"<[Hh][Tt][Mm][Ll]>((?s:.)*?)</[Hh][Tt][Mm][Ll]>").unwrap();
    static ref BLOCK_COMMENT: Regex = Regex::new(r"/%((?s:.)*?)%/").unwrap();
    static ref MONOSPACED_CHARS: Regex = Regex::new(r"\{\{\{((?s:.)*?)\}\}\}").unwrap();

    static ref BOLD_END: Regex = Regex::new(r"''").unwrap();
    static ref STRIKE_END: Regex = Regex::new(r"==").unwrap();
    static ref UNDERLINE_END: Regex = Regex::new(r"__").unwrap();
    static ref ITALIC_END: Regex = Regex::new(r"//").unwrap();
    static ref SUBSCRIPT_END: Regex = Regex::new(r"~~").unwrap();
    static ref SUPERSCRIPT_END: Regex = Regex::new(r"\^\^").unwrap();
    static ref STYLE_END: Regex = Regex::new(r"@@").unwrap();
}

/// One rule of the formatter table.
pub trait Formatter: Send + Sync {
    fn name(&self) -> &str;

    /// Start pattern. Must not match the empty string.
    fn pattern(&self) -> &str;

    /// Handle a match of the start pattern. On entry `w.match_start` and
    /// `w.match_length` describe the match and the cursor sits just past
    /// it. Return `false` to decline, in which case the matched text is
    /// emitted as plain text.
    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool;
}

/// Which formatter matched, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatterMatch {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// An ordered set of formatters compiled into one scanning pattern.
pub struct FormatterTable {
    formatters: Vec<Box<dyn Formatter>>,
    combined: Regex,
    /// Capture group of each formatter's pattern within `combined`.
    groups: Vec<usize>,
}

impl FormatterTable {
    /// Compile a table from formatters in priority order.
    pub fn new(formatters: Vec<Box<dyn Formatter>>) -> Result<Self, regex::Error> {
        let mut groups = Vec::with_capacity(formatters.len());
        let mut alternatives = Vec::with_capacity(formatters.len());
        let mut next_group = 1;

        for formatter in &formatters {
            let inner = Regex::new(formatter.pattern())?.captures_len() - 1;
            groups.push(next_group);
            next_group += 1 + inner;
            alternatives.push(format!("({})", formatter.pattern()));
        }

        let combined = RegexBuilder::new(&alternatives.join("|"))
            .multi_line(true)
            .build()?;

        Ok(Self {
            formatters,
            combined,
            groups,
        })
    }

    /// The standard wikitext formatters.
    pub fn builtin() -> Self {
        Self::new(builtin_formatters()).expect("built-in formatter patterns are valid")
    }

    /// Insert a formatter ahead of the one named `before`, or at the end
    /// when no formatter has that name.
    pub fn with_formatter_before(
        mut self,
        before: &str,
        formatter: Box<dyn Formatter>,
    ) -> Result<Self, regex::Error> {
        let at = self
            .formatters
            .iter()
            .position(|f| f.name() == before)
            .unwrap_or(self.formatters.len());
        self.formatters.insert(at, formatter);
        Self::new(self.formatters)
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formatters.iter().map(|f| f.name())
    }

    pub fn get(&self, index: usize) -> &dyn Formatter {
        self.formatters[index].as_ref()
    }

    /// The nearest formatter match at or after `start`.
    pub fn find_at(&self, source: &str, start: usize) -> Option<FormatterMatch> {
        if start > source.len() {
            return None;
        }
        let caps = self.combined.captures_at(source, start)?;
        let whole = caps.get(0)?;
        let index = self.groups.iter().position(|&g| caps.get(g).is_some())?;
        Some(FormatterMatch {
            index,
            start: whole.start(),
            end: whole.end(),
        })
    }
}

impl Default for FormatterTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for FormatterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn builtin_formatters() -> Vec<Box<dyn Formatter>> {
    vec![
        Box::new(TableFormatter),
        Box::new(Rule),
        Box::new(EmDash),
        Box::new(Heading),
        Box::new(MonospacedByLine {
            name: "monospacedByLine",
            pattern: r"^\{\{\{\n",
            lookahead: &MONOSPACED_LINES,
        }),
        Box::new(MonospacedByLine {
            name: "monospacedByLineForPlugin",
            pattern: r"^//\{\{\{\n",
            lookahead: &MONOSPACED_PLUGIN_LINES,
        }),
        Box::new(PluginComment),
        Box::new(QuoteByBlock),
        Box::new(QuoteByLine),
        Box::new(List),
        Box::new(PrettyLink),
        Box::new(UrlLink),
        Box::new(Image),
        Box::new(MacroFormatter),
        Box::new(Html),
        Box::new(BlockComment),
        Box::new(CharFormat::new("boldByChar", "''", &BOLD_END, Tag::Strong)),
        Box::new(CharFormat::new("strikeByChar", "==", &STRIKE_END, Tag::Strike)),
        Box::new(CharFormat::new("underlineByChar", "__", &UNDERLINE_END, Tag::Underline)),
        Box::new(CharFormat::new("italicByChar", "//", &ITALIC_END, Tag::Emphasis)),
        Box::new(CharFormat::new("subscriptByChar", "~~", &SUBSCRIPT_END, Tag::Subscript)),
        Box::new(CharFormat::new(
            "superscriptByChar",
            r"\^\^",
            &SUPERSCRIPT_END,
            Tag::Superscript,
        )),
        Box::new(MonospacedByChar),
        Box::new(StyleByChar),
        Box::new(LineBreak),
    ]
}

/// A link to a passage, styled broken when the store lacks the title.
pub fn internal_link(store: &Store, title: &str) -> Element {
    Element::link(Link::Passage {
        title: title.to_string(),
        broken: !store.has(title),
    })
}

/// A link leaving the story.
pub fn external_link(url: &str) -> Element {
    Element::link(Link::External {
        url: url.to_string(),
    })
}

/// Internal when the target names a passage, external otherwise.
fn link_to(store: &Store, target: &str) -> Element {
    if store.has(target) {
        internal_link(store, target)
    } else {
        external_link(target)
    }
}

/// Close the innermost open container, attaching it to its parent.
fn close_innermost(stack: &mut Vec<Element>, out: &mut Vec<Node>) {
    if let Some(closed) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(closed.into()),
            None => out.push(closed.into()),
        }
    }
}

/// A match of `re` starting exactly at `at`.
fn captures_here<'h>(re: &Regex, haystack: &'h str, at: usize) -> Option<regex::Captures<'h>> {
    if at > haystack.len() {
        return None;
    }
    re.captures_at(haystack, at)
        .filter(|caps| caps.get(0).map(|m| m.start()) == Some(at))
}

// ---------------------------------------------------------------------------
// Block formatters
// ---------------------------------------------------------------------------

struct TableFormatter;

/// Where an earlier cell of a column lives, for `~` row spans.
#[derive(Clone, Copy)]
struct ColumnRef {
    section: usize,
    row: usize,
    cell: usize,
    rows: u32,
}

impl TableFormatter {
    fn section_tag(row_type: &str) -> Tag {
        match row_type {
            "c" => Tag::Caption,
            "h" => Tag::TableHead,
            "f" => Tag::TableFoot,
            _ => Tag::TableBody,
        }
    }

    fn read_row(
        &self,
        w: &mut Wikifier<'_, '_>,
        row: &mut Element,
        sections: &mut [Element],
        prev_columns: &mut Vec<Option<ColumnRef>>,
        section: usize,
        row_index: usize,
    ) {
        let source = w.source();
        let mut col = 0;
        let mut col_span = 1;

        while let Some(caps) = captures_here(&TABLE_CELL, source, w.next_match) {
            let Some(whole) = caps.get(0) else { break };
            let content = caps.get(1).map(|m| m.as_str());

            match content {
                Some("~") => {
                    if let Some(Some(column)) = prev_columns.get_mut(col) {
                        column.rows += 1;
                        if let Some(cell) = cell_at(sections, column) {
                            cell.set_attr("rowspan", column.rows.to_string());
                            cell.set_attr("valign", "center");
                        }
                    }
                    w.next_match = whole.end() - 1;
                }
                Some(">") => {
                    col_span += 1;
                    w.next_match = whole.end() - 1;
                }
                None => {
                    w.next_match = whole.end();
                    break;
                }
                Some(_) => {
                    w.next_match += 1;
                    let styles = w.read_inline_styles();

                    let mut space_left = false;
                    while source.as_bytes().get(w.next_match) == Some(&b' ') {
                        space_left = true;
                        w.next_match += 1;
                    }

                    let tag = if source.as_bytes().get(w.next_match) == Some(&b'!') {
                        w.next_match += 1;
                        Tag::HeaderCell
                    } else {
                        Tag::Cell
                    };

                    let mut cell = Element::new(tag);
                    if col_span > 1 {
                        cell.set_attr("colspan", col_span.to_string());
                        col_span = 1;
                    }
                    cell.styles = styles;

                    w.sub_wikify(&mut cell.children, Some(&TABLE_CELL_END));
                    let closing = w.match_text().as_bytes();
                    let space_right = closing.len() >= 2 && closing[closing.len() - 2] == b' ';

                    match (space_left, space_right) {
                        (true, true) => cell.set_attr("align", "center"),
                        (true, false) => cell.set_attr("align", "right"),
                        (false, true) => cell.set_attr("align", "left"),
                        (false, false) => {}
                    }
                    // Step back onto the closing bar: it opens the next cell.
                    w.next_match = w.next_match.saturating_sub(1);

                    if prev_columns.len() <= col {
                        prev_columns.resize(col + 1, None);
                    }
                    prev_columns[col] = Some(ColumnRef {
                        section,
                        row: row_index,
                        cell: row.children.len(),
                        rows: 1,
                    });
                    row.children.push(cell.into());
                }
            }
            col += 1;
        }
    }
}

fn cell_at<'e>(sections: &'e mut [Element], at: &ColumnRef) -> Option<&'e mut Element> {
    let row = match sections.get_mut(at.section)?.children.get_mut(at.row)? {
        Node::Element(row) => row,
        _ => return None,
    };
    match row.children.get_mut(at.cell)? {
        Node::Element(cell) => Some(cell),
        _ => None,
    }
}

impl Formatter for TableFormatter {
    fn name(&self) -> &str {
        "table"
    }

    fn pattern(&self) -> &str {
        r"^\|(?:[^\n]*)\|(?:[fhc]?)$"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let source = w.source();
        w.next_match = w.match_start;

        let mut sections: Vec<Element> = Vec::new();
        let mut current_type: Option<&str> = None;
        let mut prev_columns = Vec::new();
        let mut row_count = 0;

        while let Some(caps) = captures_here(&TABLE_ROW, source, w.next_match) {
            let started_at = w.next_match;
            let row_type = caps.get(2).map_or("", |m| m.as_str());

            if current_type != Some(row_type) {
                sections.push(Element::new(Self::section_tag(row_type)));
                current_type = Some(row_type);
            }
            let section = sections.len() - 1;

            if row_type == "c" {
                let caption = &mut sections[section];
                caption.set_attr("align", if row_count == 0 { "top" } else { "bottom" });
                w.next_match += 1;
                w.sub_wikify(&mut caption.children, Some(&TABLE_ROW_END));
            } else {
                let mut row = Element::new(Tag::Row);
                let row_index = sections[section].children.len();
                self.read_row(w, &mut row, &mut sections, &mut prev_columns, section, row_index);
                sections[section].children.push(row.into());
            }
            row_count += 1;

            if w.next_match <= started_at {
                break;
            }
        }

        if sections.is_empty() {
            return false;
        }

        let mut table = Element::new(Tag::Table);
        table.children = sections.into_iter().map(Node::from).collect();
        out.push(table.into());
        true
    }
}

struct Rule;

impl Formatter for Rule {
    fn name(&self) -> &str {
        "rule"
    }

    fn pattern(&self) -> &str {
        r"^----$\n?"
    }

    fn handle(&self, _w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        out.push(Element::new(Tag::Rule).into());
        true
    }
}

struct EmDash;

impl Formatter for EmDash {
    fn name(&self) -> &str {
        "emdash"
    }

    fn pattern(&self) -> &str {
        "--"
    }

    fn handle(&self, _w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        out.push(Element::new(Tag::Span).with_text("\u{2014}").into());
        true
    }
}

struct Heading;

impl Formatter for Heading {
    fn name(&self) -> &str {
        "heading"
    }

    fn pattern(&self) -> &str {
        r"^!{1,5}"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let level = w.match_length.clamp(1, 5) as u8;
        let mut heading = Element::new(Tag::Heading(level));
        w.sub_wikify(&mut heading.children, Some(&NEWLINE));
        out.push(heading.into());
        true
    }
}

struct MonospacedByLine {
    name: &'static str,
    pattern: &'static str,
    lookahead: &'static Regex,
}

impl Formatter for MonospacedByLine {
    fn name(&self) -> &str {
        self.name
    }

    fn pattern(&self) -> &str {
        self.pattern
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let Some(caps) = captures_here(self.lookahead, w.source(), w.match_start) else {
            return false;
        };
        let text = caps.get(1).map_or("", |m| m.as_str());
        out.push(Element::new(Tag::Preformatted).with_text(text).into());
        w.next_match = caps.get(0).map_or(w.next_match, |m| m.end());
        true
    }
}

/// `/***` .. `***/`: the enclosed text renders in place.
struct PluginComment;

impl Formatter for PluginComment {
    fn name(&self) -> &str {
        "wikifyCommentForPlugin"
    }

    fn pattern(&self) -> &str {
        r"^/\*\*\*\n"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        w.sub_wikify(out, Some(&PLUGIN_COMMENT_END));
        true
    }
}

struct QuoteByBlock;

impl Formatter for QuoteByBlock {
    fn name(&self) -> &str {
        "quoteByBlock"
    }

    fn pattern(&self) -> &str {
        r"^<<<\n"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let mut quote = Element::new(Tag::BlockQuote);
        w.sub_wikify(&mut quote.children, Some(&QUOTE_BLOCK_END));
        out.push(quote.into());
        true
    }
}

/// Lines prefixed with `>`; the count of markers is the nesting level.
struct QuoteByLine;

impl Formatter for QuoteByLine {
    fn name(&self) -> &str {
        "quoteByLine"
    }

    fn pattern(&self) -> &str {
        r"^>+"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let source = w.source();
        let mut stack: Vec<Element> = Vec::new();
        let mut level = 0;
        let mut new_level = w.match_length;

        loop {
            if new_level > level {
                for _ in level..new_level {
                    stack.push(Element::new(Tag::BlockQuote));
                }
            } else {
                for _ in new_level..level {
                    close_innermost(&mut stack, out);
                }
            }
            level = new_level;

            let Some(top) = stack.last_mut() else { break };
            w.sub_wikify(&mut top.children, Some(&NEWLINE));
            top.children.push(Element::new(Tag::LineBreak).into());

            match captures_here(&QUOTE_LINE, source, w.next_match).and_then(|c| c.get(0)) {
                Some(m) => {
                    new_level = m.len();
                    w.next_match += m.len();
                }
                None => break,
            }
        }

        while !stack.is_empty() {
            close_innermost(&mut stack, out);
        }
        true
    }
}

/// `*` and `#` lists, nested by marker count.
struct List;

impl Formatter for List {
    fn name(&self) -> &str {
        "list"
    }

    fn pattern(&self) -> &str {
        r"^(?:(?:\*+)|(?:#+))"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let source = w.source();
        w.next_match = w.match_start;

        let mut stack: Vec<Element> = Vec::new();
        let mut level = 0;
        let mut current: Option<Tag> = None;

        while let Some(caps) = captures_here(&LIST_ITEM, source, w.next_match) {
            let Some(marker) = caps.get(0) else { break };
            let kind = if caps.get(1).is_some() {
                Tag::UnorderedList
            } else {
                Tag::OrderedList
            };
            let new_level = marker.len();
            w.next_match += marker.len();

            if new_level > level {
                for _ in level..new_level {
                    stack.push(Element::new(kind.clone()));
                }
            } else if new_level < level {
                for _ in new_level..level {
                    close_innermost(&mut stack, out);
                }
            } else if current.as_ref() != Some(&kind) {
                close_innermost(&mut stack, out);
                stack.push(Element::new(kind.clone()));
            }
            level = new_level;
            current = Some(kind);

            let mut item = Element::new(Tag::ListItem);
            w.sub_wikify(&mut item.children, Some(&NEWLINE));
            match stack.last_mut() {
                Some(list) => list.children.push(item.into()),
                None => out.push(item.into()),
            }
        }

        while !stack.is_empty() {
            close_innermost(&mut stack, out);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Links, images, macros and passthrough
// ---------------------------------------------------------------------------

/// `[[Title]]` and `[[Label|Target]]`.
struct PrettyLink;

impl Formatter for PrettyLink {
    fn name(&self) -> &str {
        "prettyLink"
    }

    fn pattern(&self) -> &str {
        r"\[\["
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let Some(caps) = captures_here(&PRETTY_LINK, w.source(), w.match_start) else {
            return false;
        };
        let store = &*w.ctx.store;
        let label = caps.get(1).map_or("", |m| m.as_str());

        let link = match (caps.get(2), caps.get(4)) {
            (Some(_), _) => internal_link(store, label),
            (None, Some(target)) => link_to(store, target.as_str()),
            (None, None) => return false,
        };

        out.push(link.with_text(label).into());
        w.next_match = caps.get(0).map_or(w.next_match, |m| m.end());
        true
    }
}

struct UrlLink;

impl Formatter for UrlLink {
    fn name(&self) -> &str {
        "urlLink"
    }

    fn pattern(&self) -> &str {
        r#"(?:http|https|mailto|ftp):[^\s'"]+(?:/|\b)"#
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let url = w.match_text();
        out.push(external_link(url).with_text(url).into());
        true
    }
}

/// `[img[src]]`, `[<img[title|src]]`, `[>img[src][link]]`.
struct Image;

impl Formatter for Image {
    fn name(&self) -> &str {
        "image"
    }

    fn pattern(&self) -> &str {
        r"\[(?:[<]{0,1})(?:[>]{0,1})[Ii][Mm][Gg]\["
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let Some(caps) = captures_here(&IMAGE, w.source(), w.match_start) else {
            return false;
        };
        let non_empty = |i: usize| caps.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty());

        let mut image = Element::new(Tag::Image);
        if non_empty(1).is_some() {
            image.set_attr("align", "left");
        } else if non_empty(2).is_some() {
            image.set_attr("align", "right");
        }
        if let Some(title) = non_empty(3) {
            image.set_attr("title", title);
        }
        image.set_attr("src", non_empty(4).unwrap_or(""));

        let node: Node = match non_empty(5) {
            Some(target) => link_to(w.ctx.store, target).with_child(image).into(),
            None => image.into(),
        };
        out.push(node);

        w.next_match = caps.get(0).map_or(w.next_match, |m| m.end());
        true
    }
}

/// `<<name args>>`, dispatched through the macro registry.
struct MacroFormatter;

impl Formatter for MacroFormatter {
    fn name(&self) -> &str {
        "macro"
    }

    fn pattern(&self) -> &str {
        "<<"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let Some(caps) = captures_here(&MACRO, w.source(), w.match_start) else {
            return false;
        };
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            return false;
        };
        let args = caps.get(2).map_or("", |m| m.as_str());

        w.next_match = whole.end();
        let registry = w.ctx.macros;
        registry.dispatch(out, name.as_str(), args, read_macro_params(args), w);
        true
    }
}

/// `<html>..</html>`: inner markup passes through unescaped.
struct Html;

impl Formatter for Html {
    fn name(&self) -> &str {
        "html"
    }

    fn pattern(&self) -> &str {
        r"<[Hh][Tt][Mm][Ll]>"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let Some(caps) = captures_here(&HTML, w.source(), w.match_start) else {
            return false;
        };
        let inner = caps.get(1).map_or("", |m| m.as_str());
        out.push(
            Element::new(Tag::Span)
                .with_child(Node::Html(inner.to_string()))
                .into(),
        );
        w.next_match = caps.get(0).map_or(w.next_match, |m| m.end());
        true
    }
}

/// `/% .. %/` emits nothing.
struct BlockComment;

impl Formatter for BlockComment {
    fn name(&self) -> &str {
        "commentByBlock"
    }

    fn pattern(&self) -> &str {
        "/%"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, _out: &mut Vec<Node>) -> bool {
        match captures_here(&BLOCK_COMMENT, w.source(), w.match_start).and_then(|c| c.get(0)) {
            Some(m) => {
                w.next_match = m.end();
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Inline formatters
// ---------------------------------------------------------------------------

/// A symmetric delimiter pair wrapping content in one element.
struct CharFormat {
    name: &'static str,
    pattern: &'static str,
    terminator: &'static Regex,
    tag: Tag,
}

impl CharFormat {
    fn new(name: &'static str, pattern: &'static str, terminator: &'static Regex, tag: Tag) -> Self {
        Self {
            name,
            pattern,
            terminator,
            tag,
        }
    }
}

impl Formatter for CharFormat {
    fn name(&self) -> &str {
        self.name
    }

    fn pattern(&self) -> &str {
        self.pattern
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let mut element = Element::new(self.tag.clone());
        w.sub_wikify(&mut element.children, Some(self.terminator));
        out.push(element.into());
        true
    }
}

struct MonospacedByChar;

impl Formatter for MonospacedByChar {
    fn name(&self) -> &str {
        "monospacedByChar"
    }

    fn pattern(&self) -> &str {
        r"\{\{\{"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let Some(caps) = captures_here(&MONOSPACED_CHARS, w.source(), w.match_start) else {
            return false;
        };
        let text = caps.get(1).map_or("", |m| m.as_str());
        out.push(Element::new(Tag::Code).with_text(text).into());
        w.next_match = caps.get(0).map_or(w.next_match, |m| m.end());
        true
    }
}

/// `@@color:red;text@@`, or `@@text@@` for highlighted text.
struct StyleByChar;

impl Formatter for StyleByChar {
    fn name(&self) -> &str {
        "styleByChar"
    }

    fn pattern(&self) -> &str {
        "@@"
    }

    fn handle(&self, w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        let mut span = Element::new(Tag::Span);
        let styles = w.read_inline_styles();
        if styles.is_empty() {
            span.class = Some("marked".to_string());
        } else {
            span.styles = styles;
        }
        w.sub_wikify(&mut span.children, Some(&STYLE_END));
        out.push(span.into());
        true
    }
}

struct LineBreak;

impl Formatter for LineBreak {
    fn name(&self) -> &str {
        "lineBreak"
    }

    fn pattern(&self) -> &str {
        r"\n"
    }

    fn handle(&self, _w: &mut Wikifier<'_, '_>, out: &mut Vec<Node>) -> bool {
        out.push(Element::new(Tag::LineBreak).into());
        true
    }
}
