//! Story - the primary public API for reading a story.
//!
//! A [`Story`] owns the passage store, the reader's history and the
//! formatter and macro tables, and talks to two host collaborators: a
//! [`PersistenceStore`] for remembered values and a [`Navigator`] for the
//! address that carries the resume token.

use crate::history::{decode_token, History, TokenError};
use crate::macros::{MacroInit, MacroRegistry};
use crate::navigation::{is_empty_address, MemoryNavigator, Navigator, PollOutcome};
use crate::node::{self, error_node, Link, Node};
use crate::persist::{CookieJar, PersistError, PersistenceStore};
use crate::store::{LookupField, SortField, SortOrder, Store, MISSING_PASSAGE_TEXT};
use crate::value::Variables;
use crate::wikifier::{FormatterTable, RenderContext};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Title of the passage whose text names the story.
pub const STORY_TITLE_PASSAGE: &str = "StoryTitle";

/// Errors from restoring a resume token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("no state to restore")]
    Empty,

    #[error("malformed token: {0}")]
    Malformed(#[from] TokenError),

    #[error("no passage with id {id}")]
    UnknownPassage { id: u32 },
}

/// Errors from Story operations.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Restore error: {0}")]
    Restore(#[from] RestoreError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Configuration for a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Passage shown when there is nothing to restore.
    pub start_passage: String,

    /// Story title used when there is no `StoryTitle` passage.
    pub default_title: String,

    /// Remembered-value key prefix used when there is no `StoryTitle`.
    pub default_persist_prefix: String,

    /// How long remembered values live.
    pub remember_ttl: Duration,

    /// How often `watch` polls the address.
    pub poll_interval: Duration,

    /// Deepest nesting of renders (branches, transclusions, printed text,
    /// inline markup).
    pub max_render_depth: usize,

    /// Text of passages that do not exist.
    pub missing_passage_text: String,
}

impl StoryConfig {
    pub fn new() -> Self {
        Self {
            start_passage: "Start".to_string(),
            default_title: "Sugarcane".to_string(),
            default_persist_prefix: "__jonah_".to_string(),
            remember_ttl: Duration::from_secs(365 * 24 * 60 * 60),
            poll_interval: Duration::from_millis(250),
            max_render_depth: 64,
            missing_passage_text: MISSING_PASSAGE_TEXT.to_string(),
        }
    }

    /// Set the start passage.
    pub fn with_start_passage(mut self, title: impl Into<String>) -> Self {
        self.start_passage = title.into();
        self
    }

    /// Set the fallback story title.
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Set the fallback remembered-value prefix.
    pub fn with_default_persist_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_persist_prefix = prefix.into();
        self
    }

    pub fn with_remember_ttl(mut self, ttl: Duration) -> Self {
        self.remember_ttl = ttl;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_render_depth(mut self, depth: usize) -> Self {
        self.max_render_depth = depth;
        self
    }

    pub fn with_missing_passage_text(mut self, text: impl Into<String>) -> Self {
        self.missing_passage_text = text.into();
        self
    }
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How a displayed passage reaches the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Shown with its entrance effect.
    #[default]
    Normal,
    /// Shown without effects.
    Quietly,
    /// Rendered for its side effects only; the address is left alone.
    Offscreen,
}

/// A passage as last rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPassage {
    pub title: String,
    pub id: Option<u32>,
    pub tags: Vec<String>,
    pub nodes: Vec<Node>,
    /// Token resuming at this passage.
    pub token: String,
    pub mode: DisplayMode,
}

impl RenderedPassage {
    /// Plain text of the rendered passage.
    pub fn text(&self) -> String {
        node::text_content(&self.nodes)
    }

    pub fn html(&self) -> String {
        node::to_html(&self.nodes)
    }

    pub fn links(&self) -> Vec<&Link> {
        node::links(&self.nodes)
    }
}

/// How `start` arrived at the first passage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The address held a token and history was rebuilt from it.
    Restored,
    /// There was nothing to restore; the start passage is shown.
    Fresh,
    /// The address held a token that could not be restored; the start
    /// passage is shown instead.
    RestoreFailed(RestoreError),
}

/// What activating a link did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// A passage was displayed.
    Displayed { title: String },
    /// The address changed and was polled.
    Navigated(PollOutcome),
    /// The link leaves the story; the host should open it.
    External { url: String },
}

/// A snapback point: a bookmarked passage in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub title: String,
    pub excerpt: String,
    pub token: String,
}

/// A story being read.
pub struct Story<P = CookieJar, N = MemoryNavigator>
where
    P: PersistenceStore + 'static,
    N: Navigator,
{
    store: Store,
    history: History,
    formatters: FormatterTable,
    macros: MacroRegistry,
    config: StoryConfig,
    persistence: P,
    navigator: N,
    title: String,
    persist_prefix: String,
    /// The address as the story last saw it.
    last_address: String,
    /// Action titles offered by the most recent render.
    offered_actions: Vec<String>,
    /// Titles of plain passage links in the most recent render.
    offered_passages: Vec<String>,
    current: Option<RenderedPassage>,
}

impl<P, N> Story<P, N>
where
    P: PersistenceStore + 'static,
    N: Navigator,
{
    /// Create a story with the built-in formatters and macros.
    pub fn new(store: Store, config: StoryConfig, persistence: P, navigator: N) -> Self {
        let store = store.with_missing_text(config.missing_passage_text.clone());
        let story_title = store
            .find(STORY_TITLE_PASSAGE)
            .map(|p| p.text().to_string());
        let title = story_title
            .clone()
            .unwrap_or_else(|| config.default_title.clone());
        let persist_prefix = story_title
            .map(|t| format!("{t}_"))
            .unwrap_or_else(|| config.default_persist_prefix.clone());

        let mut story = Self {
            store,
            history: History::new(),
            formatters: FormatterTable::builtin(),
            macros: MacroRegistry::builtin(),
            config,
            persistence,
            navigator,
            title,
            persist_prefix,
            last_address: String::new(),
            offered_actions: Vec::new(),
            offered_passages: Vec::new(),
            current: None,
        };
        story.reset_history();
        story
    }

    /// Replace the formatter table.
    pub fn with_formatters(mut self, formatters: FormatterTable) -> Self {
        self.formatters = formatters;
        self
    }

    /// Replace the macro registry. History restarts so the new macros'
    /// startup hooks run.
    pub fn with_macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = macros;
        self.reset_history();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    /// Key prefix for remembered values.
    pub fn persist_prefix(&self) -> &str {
        &self.persist_prefix
    }

    /// The passage most recently displayed.
    pub fn current(&self) -> Option<&RenderedPassage> {
        self.current.as_ref()
    }

    /// Variables the first history entry starts with: empty, then seeded
    /// by every macro's startup hook.
    pub fn initial_variables(&self) -> Variables {
        let mut variables = Variables::new();
        let mut init = MacroInit {
            store: &self.store,
            persistence: &self.persistence,
            persist_prefix: &self.persist_prefix,
            variables: &mut variables,
        };
        self.macros.run_init(&mut init);
        variables
    }

    fn reset_history(&mut self) {
        let variables = self.initial_variables();
        self.history.reset(variables);
        self.offered_actions.clear();
        self.offered_passages.clear();
    }

    /// Begin reading: restore from the address if it holds a token,
    /// otherwise show the start passage.
    pub fn start(&mut self) -> StartOutcome {
        let address = self.navigator.address();
        let outcome = if is_empty_address(&address) {
            StartOutcome::Fresh
        } else {
            match self.restore(&address) {
                Ok(()) => StartOutcome::Restored,
                Err(e) => {
                    tracing::warn!(token = %address, error = %e, "could not restore; starting over");
                    StartOutcome::RestoreFailed(e)
                }
            }
        };

        if outcome != StartOutcome::Restored {
            self.reset_history();
            let start = self.config.start_passage.clone();
            self.display(&start, DisplayMode::Normal);
        }
        self.last_address = self.navigator.address();
        outcome
    }

    /// Make `title` the current passage and render it.
    pub fn display(&mut self, title: &str, mode: DisplayMode) -> &RenderedPassage {
        tracing::info!(title, ?mode, "displaying passage");

        let passage = self.store.get(title).into_owned();
        self.history.push(&passage);

        let mut ctx = RenderContext::new(
            &mut self.store,
            &mut self.history,
            &mut self.persistence,
            &self.formatters,
            &self.macros,
            &self.config,
            &self.persist_prefix,
        );
        let nodes = match ctx.render(passage.text()) {
            Ok(nodes) => nodes,
            Err(e) => vec![error_node(e.to_string())],
        };
        self.offered_actions = std::mem::take(&mut ctx.offered_actions);
        self.offered_passages = passage_link_titles(&nodes);

        let token = self.history.current().token.clone();
        if mode != DisplayMode::Offscreen {
            if passage.title() == self.config.start_passage {
                self.navigator.set_title(&self.title);
            } else {
                self.navigator
                    .set_title(&format!("{}: {}", self.title, passage.title()));
                self.navigator.set_address(&token);
            }
            self.last_address = self.navigator.address();
            self.navigator.focus_top();
        }

        let rendered = RenderedPassage {
            title: passage.title().to_string(),
            id: passage.id(),
            tags: passage.tags().to_vec(),
            nodes,
            token,
            mode,
        };
        self.current.insert(rendered)
    }

    /// Render the current entry's passage again without moving in history.
    pub fn rerender(&mut self) -> Option<&RenderedPassage> {
        let title = self.history.current().passage.clone()?;
        let mode = self.current.as_ref().map_or(DisplayMode::Quietly, |c| c.mode);
        let passage = self.store.get(&title).into_owned();

        let mut ctx = RenderContext::new(
            &mut self.store,
            &mut self.history,
            &mut self.persistence,
            &self.formatters,
            &self.macros,
            &self.config,
            &self.persist_prefix,
        );
        let nodes = match ctx.render(passage.text()) {
            Ok(nodes) => nodes,
            Err(e) => vec![error_node(e.to_string())],
        };
        self.offered_actions = std::mem::take(&mut ctx.offered_actions);
        self.offered_passages = passage_link_titles(&nodes);

        let rendered = RenderedPassage {
            title: passage.title().to_string(),
            id: passage.id(),
            tags: passage.tags().to_vec(),
            nodes,
            token: self.history.current().token.clone(),
            mode,
        };
        Some(self.current.insert(rendered))
    }

    /// Rebuild history from a resume token by replaying every passage in
    /// order, showing only the last.
    pub fn restore(&mut self, token: &str) -> Result<(), RestoreError> {
        if is_empty_address(token) {
            return Err(RestoreError::Empty);
        }
        let ids = decode_token(token)?;

        let mut titles = Vec::with_capacity(ids.len());
        for id in &ids {
            let passage = self
                .store
                .get_by_id(*id)
                .ok_or(RestoreError::UnknownPassage { id: *id })?;
            titles.push(passage.title().to_string());
        }

        self.reset_history();
        let last = titles.len().saturating_sub(1);
        for (i, title) in titles.iter().enumerate() {
            tracing::debug!(id = ids[i], title = %title, "restoring");

            // Arriving at an action the previous passage offered means it
            // was clicked, unless a plain link led there as well.
            if i > 0
                && self.offered_actions.contains(title)
                && !self.offered_passages.contains(title)
            {
                self.history
                    .current_mut()
                    .variables
                    .mark_action_clicked(title.clone());
            }

            let mode = if i == last {
                DisplayMode::Normal
            } else {
                DisplayMode::Offscreen
            };
            self.display(title, mode);
        }
        Ok(())
    }

    /// Clear all state and ask the host to reload.
    pub fn restart(&mut self) {
        tracing::info!("restarting story");
        self.reset_history();
        self.store.reset_all();
        self.current = None;
        self.navigator.set_address("");
        self.last_address = String::new();
        self.navigator.request_reload();
    }

    /// Compare the address with the last one seen and react to a change.
    pub fn poll(&mut self) -> PollOutcome {
        let address = self.navigator.address();
        if address == self.last_address {
            return PollOutcome::Unchanged;
        }
        tracing::info!(new = %address, was = %self.last_address, "address changed");

        let outcome = if is_empty_address(&address) {
            self.navigator.request_reload();
            PollOutcome::ReloadRequested
        } else {
            match self.restore(&address) {
                Ok(()) => PollOutcome::Restored { token: address },
                Err(e) => {
                    tracing::warn!(token = %address, error = %e, "previously visited passage not found");
                    PollOutcome::RestoreFailed {
                        token: address,
                        reason: e.to_string(),
                    }
                }
            }
        };

        // A restore may rewrite the address in canonical form.
        self.last_address = self.navigator.address();
        outcome
    }

    /// Poll the address every `poll_interval` until `until` accepts an
    /// outcome, which is returned.
    pub async fn watch<F>(&mut self, mut until: F) -> PollOutcome
    where
        F: FnMut(&PollOutcome) -> bool,
    {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            interval.tick().await;
            let outcome = self.poll();
            if until(&outcome) {
                return outcome;
            }
        }
    }

    /// Follow a link the reader activated.
    pub fn activate(&mut self, link: &Link) -> Activation {
        match link {
            Link::Passage { title, .. } => {
                self.display(title, DisplayMode::Normal);
                Activation::Displayed {
                    title: title.clone(),
                }
            }
            Link::Action { title, .. } => {
                self.history
                    .current_mut()
                    .variables
                    .mark_action_clicked(title.clone());
                self.display(title, DisplayMode::Normal);
                Activation::Displayed {
                    title: title.clone(),
                }
            }
            Link::Back { token } => {
                self.navigator.set_address(token);
                Activation::Navigated(self.poll())
            }
            Link::External { url } => Activation::External { url: url.clone() },
        }
    }

    /// Render the passage `title` for a page region, or `default` when the
    /// story has no such passage. History is not touched.
    pub fn page_element(&mut self, title: &str, default: &str) -> Vec<Node> {
        let source = match self.store.find(title) {
            Some(passage) => passage.text().to_string(),
            None => default.to_string(),
        };
        self.render_source(&source)
    }

    /// Render arbitrary wikitext against the current history entry.
    pub fn render_source(&mut self, source: &str) -> Vec<Node> {
        let mut ctx = RenderContext::new(
            &mut self.store,
            &mut self.history,
            &mut self.persistence,
            &self.formatters,
            &self.macros,
            &self.config,
            &self.persist_prefix,
        );
        ctx.render(source)
            .unwrap_or_else(|e| vec![error_node(e.to_string())])
    }

    /// Texts of passages tagged `stylesheet`, in cascade order (ascending
    /// by title, so later titles override earlier ones).
    pub fn stylesheets(&self) -> Vec<&str> {
        self.store
            .lookup_ordered(
                LookupField::Tags,
                "stylesheet",
                SortField::Title,
                SortOrder::Ascending,
            )
            .into_iter()
            .map(|p| p.text())
            .collect()
    }

    /// Titles of passages tagged `script`. Their code is never run.
    pub fn scripts(&self) -> Vec<&str> {
        let titles: Vec<&str> = self
            .store
            .lookup_ordered(LookupField::Tags, "script", SortField::Title, SortOrder::Ascending)
            .into_iter()
            .map(|p| p.title())
            .collect();
        if !titles.is_empty() {
            tracing::warn!(?titles, "script passages are not executed");
        }
        titles
    }

    /// Bookmarked passages in the history, oldest first.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.history
            .iter_oldest_first()
            .filter_map(|entry| {
                let passage = self.store.find(entry.title()?)?;
                passage.has_tag("bookmark").then(|| Bookmark {
                    title: passage.title().to_string(),
                    excerpt: passage.excerpt(),
                    token: entry.token.clone(),
                })
            })
            .collect()
    }
}

fn passage_link_titles(nodes: &[Node]) -> Vec<String> {
    node::links(nodes)
        .into_iter()
        .filter_map(|link| match link {
            Link::Passage { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect()
}

impl<N: Navigator> Story<CookieJar, N> {
    /// Save remembered values to a cookie file.
    pub async fn save_cookies(&self, path: impl AsRef<Path>) -> Result<(), StoryError> {
        self.persistence.save_json(path).await?;
        Ok(())
    }
}

impl Story<CookieJar, MemoryNavigator> {
    /// A story with in-memory persistence and navigation.
    pub fn in_memory(store: Store, config: StoryConfig) -> Self {
        Self::new(store, config, CookieJar::new(), MemoryNavigator::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passage::PassageRecord;

    fn story(records: Vec<PassageRecord>) -> Story {
        Story::in_memory(Store::from_records(records), StoryConfig::default())
    }

    #[test]
    fn test_title_and_prefix_from_story_title() {
        let s = story(vec![
            PassageRecord::new("StoryTitle", "The Cave", 1),
            PassageRecord::new("Start", "Hi", 2),
        ]);
        assert_eq!(s.title(), "The Cave");
        assert_eq!(s.persist_prefix(), "The Cave_");

        let untitled = story(vec![PassageRecord::new("Start", "Hi", 1)]);
        assert_eq!(untitled.title(), "Sugarcane");
        assert_eq!(untitled.persist_prefix(), "__jonah_");
    }

    #[test]
    fn test_start_fresh_leaves_address_empty() {
        let mut s = story(vec![
            PassageRecord::new("StoryTitle", "The Cave", 1),
            PassageRecord::new("Start", "Hi", 2),
        ]);
        assert_eq!(s.start(), StartOutcome::Fresh);
        assert_eq!(s.current().map(|c| c.text()), Some("Hi".to_string()));
        assert_eq!(s.navigator().address(), "");
        assert_eq!(s.navigator().title(), "The Cave");
        assert_eq!(s.poll(), PollOutcome::Unchanged);
    }

    #[test]
    fn test_display_sets_address_and_title() {
        let mut s = story(vec![
            PassageRecord::new("Start", "[[Hall]]", 1),
            PassageRecord::new("Hall", "A hall", 2),
        ]);
        s.start();
        let token = s.display("Hall", DisplayMode::Normal).token.clone();
        assert_eq!(token, "#1.2");
        assert_eq!(s.navigator().address(), "#1.2");
        assert_eq!(s.navigator().title(), "Sugarcane: Hall");
        assert_eq!(s.navigator().focus_count(), 2);
    }

    #[test]
    fn test_offscreen_leaves_address_alone() {
        let mut s = story(vec![
            PassageRecord::new("Start", "", 1),
            PassageRecord::new("Hall", "", 2),
        ]);
        s.display("Hall", DisplayMode::Offscreen);
        assert_eq!(s.navigator().address(), "");
        assert_eq!(s.history().current().token, "#2");
    }

    #[test]
    fn test_restore_rejects_unknown_ids_before_displaying() {
        let mut s = story(vec![PassageRecord::new("Start", "", 1)]);
        assert_eq!(
            s.restore("#1.zz"),
            Err(RestoreError::UnknownPassage { id: 1295 })
        );
        assert!(!s.history().has_passages());
        assert_eq!(s.restore("#"), Err(RestoreError::Empty));
        assert!(matches!(s.restore("#1..2"), Err(RestoreError::Malformed(_))));
    }

    #[test]
    fn test_restart_requests_reload() {
        let mut s = story(vec![
            PassageRecord::new("Start", "", 1),
            PassageRecord::new("Hall", "", 2),
        ]);
        s.start();
        s.display("Hall", DisplayMode::Normal);
        s.restart();
        assert_eq!(s.navigator().address(), "");
        assert_eq!(s.navigator().reloads(), 1);
        assert!(!s.history().has_passages());
    }

    #[test]
    fn test_config_builder() {
        let config = StoryConfig::new()
            .with_start_passage("Intro")
            .with_max_render_depth(8)
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(config.start_passage, "Intro");
        assert_eq!(config.max_render_depth, 8);
        assert_eq!(config.default_title, "Sugarcane");
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: StoryConfig =
            serde_json::from_str(r#"{"start_passage": "Intro"}"#).expect("valid config");
        assert_eq!(config.start_passage, "Intro");
        assert_eq!(config.default_persist_prefix, "__jonah_");
    }
}
