//! Test fixtures and assertion helpers for stories.
//!
//! [`StoryFixture`] builds a small story from inline passages without any
//! host, numbering passages in the order they are added.

use crate::navigation::{MemoryNavigator, Navigator};
use crate::node::{self, Link};
use crate::passage::PassageRecord;
use crate::persist::CookieJar;
use crate::story::{Story, StoryConfig};
use crate::store::Store;
use crate::value::Value;

/// Builder for an in-memory story.
#[derive(Debug, Clone, Default)]
pub struct StoryFixture {
    records: Vec<PassageRecord>,
    config: StoryConfig,
    cookies: CookieJar,
    address: Option<String>,
}

impl StoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a passage. Ids follow insertion order, starting at 1.
    pub fn with_passage(self, title: &str, text: &str) -> Self {
        self.with_tagged_passage(title, text, &[])
    }

    pub fn with_tagged_passage(mut self, title: &str, text: &str, tags: &[&str]) -> Self {
        let id = self.records.len() as u32 + 1;
        self.records
            .push(PassageRecord::new(title, text, id).with_tags(tags.iter().copied()));
        self
    }

    pub fn with_config(mut self, config: StoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Start with previously remembered values.
    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    /// Start with a token already in the address.
    pub fn with_address(mut self, token: impl Into<String>) -> Self {
        self.address = Some(token.into());
        self
    }

    pub fn store(&self) -> Store {
        Store::from_records(self.records.clone())
    }

    /// Build the story without starting it.
    pub fn build(self) -> Story<CookieJar, MemoryNavigator> {
        let navigator = match &self.address {
            Some(token) => MemoryNavigator::with_address(token.clone()),
            None => MemoryNavigator::new(),
        };
        Story::new(self.store(), self.config, self.cookies, navigator)
    }

    /// Build and start the story.
    pub fn start(self) -> Story<CookieJar, MemoryNavigator> {
        let mut story = self.build();
        story.start();
        story
    }
}

/// Render `source` in a story holding only an empty start passage and
/// return its plain text.
pub fn render_text(source: &str) -> String {
    let mut story = StoryFixture::new().with_passage("Start", "").start();
    node::text_content(&story.render_source(source))
}

/// Render `source` the same way and return HTML.
pub fn render_html(source: &str) -> String {
    let mut story = StoryFixture::new().with_passage("Start", "").start();
    node::to_html(&story.render_source(source))
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the current passage's plain text.
#[track_caller]
pub fn assert_text<P, N>(story: &Story<P, N>, expected: &str)
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    let actual = story.current().map(|c| c.text()).unwrap_or_default();
    assert_eq!(actual, expected, "Unexpected passage text");
}

/// Assert the current passage's title.
#[track_caller]
pub fn assert_at<P, N>(story: &Story<P, N>, title: &str)
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    let actual = story.current().map(|c| c.title.as_str());
    assert_eq!(actual, Some(title), "Expected to be at passage '{title}'");
}

/// Assert a variable of the current history entry.
#[track_caller]
pub fn assert_variable<P, N>(story: &Story<P, N>, name: &str, expected: impl Into<Value>)
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    let expected = expected.into();
    let actual = story.history().current().variables.get(name);
    assert_eq!(actual, expected, "Unexpected value for ${name}");
}

/// Assert the current passage links to `title` (passage or action link).
#[track_caller]
pub fn assert_links_to<P, N>(story: &Story<P, N>, title: &str)
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    assert!(
        find_link(story, title).is_some(),
        "Expected a link to '{title}'"
    );
}

/// Assert the current passage has no link to `title`.
#[track_caller]
pub fn assert_no_link_to<P, N>(story: &Story<P, N>, title: &str)
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    assert!(
        find_link(story, title).is_none(),
        "Expected no link to '{title}'"
    );
}

/// The first passage or action link to `title` on the current passage.
pub fn find_link<P, N>(story: &Story<P, N>, title: &str) -> Option<Link>
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    story
        .current()?
        .links()
        .into_iter()
        .find(|link| match link {
            Link::Passage { title: t, .. } | Link::Action { title: t, .. } => t == title,
            _ => false,
        })
        .cloned()
}

/// The first back link on the current passage.
pub fn find_back_link<P, N>(story: &Story<P, N>) -> Option<Link>
where
    P: crate::persist::PersistenceStore + 'static,
    N: Navigator,
{
    story
        .current()?
        .links()
        .into_iter()
        .find(|link| matches!(link, Link::Back { .. }))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_numbers_passages() {
        let fixture = StoryFixture::new()
            .with_passage("Start", "Hi")
            .with_tagged_passage("Hall", "A hall", &["bookmark"]);
        let store = fixture.store();
        assert_eq!(store.get_by_id(2).map(|p| p.title()), Some("Hall"));
        assert!(store.find("Hall").is_some_and(|p| p.has_tag("bookmark")));
    }

    #[test]
    fn test_assertions_on_started_story() {
        let story = StoryFixture::new()
            .with_passage("Start", "<<set $gold = 3>>[[Hall]]")
            .with_passage("Hall", "")
            .start();
        assert_at(&story, "Start");
        assert_variable(&story, "gold", 3);
        assert_links_to(&story, "Hall");
        assert_no_link_to(&story, "Cellar");
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render_text("''bold'' move"), "bold move");
        assert_eq!(render_html("''bold''"), "<strong>bold</strong>");
    }
}
