//! The passage store: every passage of one story, by title and id.

use crate::passage::{Passage, PassageRecord};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Placeholder text for titles the store does not hold.
pub const MISSING_PASSAGE_TEXT: &str = "@@This passage does not exist.@@";

/// A key identifying a passage: its title or its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassageKey<'a> {
    Title(&'a str),
    Id(u32),
}

impl<'a> From<&'a str> for PassageKey<'a> {
    fn from(title: &'a str) -> Self {
        PassageKey::Title(title)
    }
}

impl<'a> From<&'a String> for PassageKey<'a> {
    fn from(title: &'a String) -> Self {
        PassageKey::Title(title.as_str())
    }
}

impl From<u32> for PassageKey<'_> {
    fn from(id: u32) -> Self {
        PassageKey::Id(id)
    }
}

/// Which passage collection a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupField {
    Tags,
    Title,
}

/// Which passage property orders lookup results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Title,
    Id,
}

/// Direction of lookup ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// All passages of a story.
///
/// Built once from passage records; entries are never removed.
#[derive(Debug, Clone)]
pub struct Store {
    passages: Vec<Passage>,
    by_title: HashMap<String, usize>,
    missing_text: String,
}

impl Store {
    pub fn new() -> Self {
        Self {
            passages: Vec::new(),
            by_title: HashMap::new(),
            missing_text: MISSING_PASSAGE_TEXT.to_string(),
        }
    }

    /// Build a store from loader records. A later record with a repeated
    /// title replaces the earlier one, as a keyed map would.
    pub fn from_records(records: impl IntoIterator<Item = PassageRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Set the placeholder text used for missing passages.
    pub fn with_missing_text(mut self, text: impl Into<String>) -> Self {
        self.missing_text = text.into();
        self
    }

    fn insert(&mut self, record: PassageRecord) {
        let passage = Passage::from_record(record);
        match self.by_title.get(passage.title()) {
            Some(&index) => self.passages[index] = passage,
            None => {
                self.by_title
                    .insert(passage.title().to_string(), self.passages.len());
                self.passages.push(passage);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passages in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter()
    }

    /// Whether a passage exists for the title or id.
    pub fn has<'k>(&self, key: impl Into<PassageKey<'k>>) -> bool {
        match key.into() {
            PassageKey::Title(title) => self.by_title.contains_key(title),
            PassageKey::Id(id) => self.passages.iter().any(|p| p.id() == Some(id)),
        }
    }

    /// Fetch a passage by title. Unknown titles yield a fresh stand-in
    /// carrying the placeholder text.
    pub fn get(&self, title: &str) -> Cow<'_, Passage> {
        match self.by_title.get(title) {
            Some(&index) => Cow::Borrowed(&self.passages[index]),
            None => Cow::Owned(Passage::missing(title, &self.missing_text)),
        }
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Passage> {
        self.passages.iter().find(|p| p.id() == Some(id))
    }

    pub fn get_mut(&mut self, title: &str) -> Option<&mut Passage> {
        let index = *self.by_title.get(title)?;
        self.passages.get_mut(index)
    }

    /// Fetch by title or id, `None` when absent.
    pub fn find<'k>(&self, key: impl Into<PassageKey<'k>>) -> Option<&Passage> {
        match key.into() {
            PassageKey::Title(title) => self.by_title.get(title).map(|&i| &self.passages[i]),
            PassageKey::Id(id) => self.get_by_id(id),
        }
    }

    /// Passages whose field collection contains `value`, ordered by
    /// `sort` (title when `None`) in descending order.
    pub fn lookup(&self, field: LookupField, value: &str, sort: Option<SortField>) -> Vec<&Passage> {
        self.lookup_ordered(field, value, sort.unwrap_or_default(), SortOrder::Descending)
    }

    /// `lookup` with an explicit direction.
    pub fn lookup_ordered(
        &self,
        field: LookupField,
        value: &str,
        sort: SortField,
        order: SortOrder,
    ) -> Vec<&Passage> {
        let mut results: Vec<&Passage> = self
            .passages
            .iter()
            .filter(|p| match field {
                LookupField::Tags => p.has_tag(value),
                LookupField::Title => p.title() == value,
            })
            .collect();

        results.sort_by(|a, b| {
            let ordering = compare(a, b, sort);
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        results
    }

    /// Restore every passage's text to its loaded text.
    pub fn reset_all(&mut self) {
        tracing::debug!("resetting all passages");
        for passage in &mut self.passages {
            passage.reset();
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn compare(a: &Passage, b: &Passage, sort: SortField) -> Ordering {
    match sort {
        SortField::Title => a.title().cmp(b.title()),
        SortField::Id => a.id().cmp(&b.id()),
    }
}
