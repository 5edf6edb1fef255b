//! Story history and the resume token.
//!
//! History is the sequence of passages read, each paired with the
//! variables as they stood while it was shown. Index 0 is the current
//! entry. Every entry owns its own copy of the variables, so changes made
//! while showing one passage never reach the entries before it.
//!
//! The resume token records only which passages were read, oldest first:
//! `#` followed by base-36 passage ids separated by `.`. Variables are
//! rebuilt by replaying the passages in order.

use crate::passage::Passage;
use crate::value::Variables;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker every resume token starts with.
pub const TOKEN_MARKER: char = '#';

const SEPARATOR: char = '.';

/// Errors from reading a resume token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token does not start with '#'")]
    MissingMarker,

    #[error("empty id at position {position}")]
    EmptySegment { position: usize },

    #[error("invalid passage id \"{segment}\"")]
    InvalidId { segment: String },
}

/// One point in the reader's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Title of the passage shown; `None` only for the starting sentinel.
    pub passage: Option<String>,
    pub passage_id: Option<u32>,
    pub variables: Variables,
    /// Token that resumes at exactly this entry.
    pub token: String,
}

impl HistoryEntry {
    fn sentinel(variables: Variables) -> Self {
        Self {
            passage: None,
            passage_id: None,
            variables,
            token: String::new(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.passage.as_deref()
    }

    pub fn is_sentinel(&self) -> bool {
        self.passage.is_none()
    }
}

/// The reader's history, never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Oldest first; the last element is the current entry.
    entries: Vec<HistoryEntry>,
}

impl History {
    /// A history holding only the starting sentinel.
    pub fn new() -> Self {
        Self::with_variables(Variables::new())
    }

    /// A history whose sentinel starts with `variables`.
    pub fn with_variables(variables: Variables) -> Self {
        Self {
            entries: vec![HistoryEntry::sentinel(variables)],
        }
    }

    /// Discard everything and start again from `variables`.
    pub fn reset(&mut self, variables: Variables) {
        tracing::debug!(discarded = self.entries.len(), "resetting history");
        self.entries.clear();
        self.entries.push(HistoryEntry::sentinel(variables));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether anything beyond the sentinel has been read.
    pub fn has_passages(&self) -> bool {
        self.entries.iter().any(|e| !e.is_sentinel())
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.entries.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut HistoryEntry {
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    /// Entry `index` back from the current one (0 is current).
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        let position = self.entries.len().checked_sub(index + 1)?;
        self.entries.get(position)
    }

    /// Entries from the current one backwards.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().rev()
    }

    /// Entries from the oldest forwards.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Ids of the passages read, oldest first.
    pub fn passage_ids(&self) -> Vec<u32> {
        self.entries.iter().filter_map(|e| e.passage_id).collect()
    }

    /// Make `passage` current. Its variables start as a copy of the
    /// previous current entry's; its token is computed once it is in place.
    pub fn push(&mut self, passage: &Passage) -> &mut HistoryEntry {
        let variables = self.current().variables.clone();
        self.entries.push(HistoryEntry {
            passage: Some(passage.title().to_string()),
            passage_id: passage.id(),
            variables,
            token: String::new(),
        });

        let token = encode_token(&self.passage_ids());
        let entry = self.current_mut();
        entry.token = token;
        entry
    }

    /// Token resuming at the current entry.
    pub fn token(&self) -> String {
        encode_token(&self.passage_ids())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode passage ids, oldest first.
pub fn encode_token(ids: &[u32]) -> String {
    let mut token = String::from(TOKEN_MARKER);
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            token.push(SEPARATOR);
        }
        token.push_str(&to_base36(*id));
    }
    token
}

/// Decode a token into passage ids, oldest first. `#` alone decodes to
/// no ids.
pub fn decode_token(token: &str) -> Result<Vec<u32>, TokenError> {
    let body = token
        .strip_prefix(TOKEN_MARKER)
        .ok_or(TokenError::MissingMarker)?;
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split(SEPARATOR)
        .enumerate()
        .map(|(position, segment)| {
            if segment.is_empty() {
                return Err(TokenError::EmptySegment { position });
            }
            let invalid = || TokenError::InvalidId {
                segment: segment.to_string(),
            };
            if !segment.bytes().all(|b| b.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
            u32::from_str_radix(segment, 36).map_err(|_| invalid())
        })
        .collect()
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}
