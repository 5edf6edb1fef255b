//! Passages: the named units of story content.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref MACRO_CALL: Regex = Regex::new(r"<<.*?>>").unwrap();
    static ref HEADING_LINE: Regex = Regex::new(r"!.*?\n").unwrap();
    static ref LINK_PUNCTUATION: Regex = Regex::new(r"[\[\]/]").unwrap();
    static ref FIRST_WORDS: Regex =
        Regex::new(r"(.*?\s.*?\s.*?\s.*?\s.*?\s.*?\s.*?)\s").unwrap();
    static ref BRACKETED_LIST: Regex = Regex::new(r"\[\[([^\]]+)\]\]|([^\s$]+)").unwrap();
}

/// A raw passage as supplied by the story-source loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Position in the source document; becomes the passage id.
    pub source_order: u32,
}

impl PassageRecord {
    pub fn new(title: impl Into<String>, text: impl Into<String>, source_order: u32) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            tags: Vec::new(),
            source_order,
        }
    }

    /// Add tags to the record.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Build a record from TiddlyWiki-style storage: escaped text and a
    /// bracketed tag attribute.
    pub fn from_tiddler(title: &str, escaped_text: &str, tags: Option<&str>, order: u32) -> Self {
        Self {
            title: title.to_string(),
            text: unescape_line_breaks(escaped_text),
            tags: tags.map(read_bracketed_list).unwrap_or_default(),
            source_order: order,
        }
    }
}

/// A passage in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    title: String,
    id: Option<u32>,
    raw_text: String,
    text: String,
    tags: Vec<String>,
}

impl Passage {
    pub fn from_record(record: PassageRecord) -> Self {
        let mut tags = Vec::with_capacity(record.tags.len());
        for tag in record.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Self {
            title: record.title,
            id: Some(record.source_order),
            raw_text: record.text.clone(),
            text: record.text,
            tags,
        }
    }

    /// The stand-in returned for titles the store does not hold.
    pub fn missing(title: impl Into<String>, placeholder: &str) -> Self {
        Self {
            title: title.into(),
            id: None,
            raw_text: placeholder.to_string(),
            text: placeholder.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The stable id; `None` only for missing-passage stand-ins.
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn is_missing(&self) -> bool {
        self.id.is_none()
    }

    /// Current text, possibly rewritten since load.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text as loaded.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Restore the current text to the loaded text.
    pub fn reset(&mut self) {
        tracing::debug!(title = %self.title, "resetting passage");
        self.text = self.raw_text.clone();
    }

    /// Element id used by hosts that place the passage in a page.
    pub fn dom_id(&self) -> String {
        format!("passage{}", self.title.split(' ').collect::<Vec<_>>().join("_"))
    }

    /// A short excerpt of the passage: its first seven words with markup
    /// removed.
    pub fn excerpt(&self) -> String {
        let text = MACRO_CALL.replace_all(&self.text, "");
        let text = HEADING_LINE.replace_all(&text, "");
        let text = LINK_PUNCTUATION.replace_all(&text, "");

        match FIRST_WORDS.captures(&text) {
            Some(caps) => format!("{}...", &caps[1]),
            None => format!("{}...", text.trim()),
        }
    }
}

/// Convert the `\n` escapes used by TiddlyWiki storage into newlines.
pub fn unescape_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push('\n');
            }
            '\r' => {}
            _ => out.push(c),
        }
    }

    out
}

/// Read a list like `foo [[bar baz]] qux` into its items.
pub fn read_bracketed_list(text: &str) -> Vec<String> {
    BRACKETED_LIST
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_line_breaks() {
        assert_eq!(unescape_line_breaks(r"one\ntwo"), "one\ntwo");
        assert_eq!(unescape_line_breaks("a\r\nb"), "a\nb");
        assert_eq!(unescape_line_breaks(r"back\slash"), r"back\slash");
    }

    #[test]
    fn test_read_bracketed_list() {
        assert_eq!(
            read_bracketed_list("bookmark [[two words]] script"),
            vec!["bookmark", "two words", "script"]
        );
        assert!(read_bracketed_list("   ").is_empty());
    }

    #[test]
    fn test_from_tiddler() {
        let record = PassageRecord::from_tiddler("Start", r"Hello\nworld", Some("a b"), 3);
        assert_eq!(record.text, "Hello\nworld");
        assert_eq!(record.tags, vec!["a", "b"]);
        assert_eq!(record.source_order, 3);
    }

    #[test]
    fn test_reset_restores_raw_text() {
        let mut passage = Passage::from_record(PassageRecord::new("Cave", "dark", 1));
        passage.set_text("lit");
        assert_eq!(passage.text(), "lit");
        passage.reset();
        assert_eq!(passage.text(), "dark");
        assert_eq!(passage.raw_text(), "dark");
    }

    #[test]
    fn test_excerpt() {
        let passage = Passage::from_record(PassageRecord::new(
            "Long",
            "<<set $x = 1>>You wake up in a [[room]] with no doors at all today.",
            2,
        ));
        assert_eq!(passage.excerpt(), "You wake up in a room with...");

        let short = Passage::from_record(PassageRecord::new("Short", "Just this", 3));
        assert_eq!(short.excerpt(), "Just this...");
    }

    #[test]
    fn test_duplicate_tags_collapse() {
        let passage = Passage::from_record(
            PassageRecord::new("Tagged", "", 4).with_tags(["bookmark", "bookmark", "x"]),
        );
        assert_eq!(passage.tags(), &["bookmark".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_dom_id() {
        let passage = Passage::from_record(PassageRecord::new("The Dark Hall", "", 5));
        assert_eq!(passage.dom_id(), "passageThe_Dark_Hall");
    }
}
