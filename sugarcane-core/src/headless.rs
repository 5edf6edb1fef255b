//! Headless story interface for programmatic use.
//!
//! Plays a story without any display: links are followed by their visible
//! text and every passage shown is kept in a transcript. Useful for
//! scripted playthroughs and tests.
//!
//! # Example
//!
//! ```ignore
//! use sugarcane_core::headless::HeadlessStory;
//! use sugarcane_core::{PassageRecord, Store, StoryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::from_records(vec![
//!         PassageRecord::new("Start", "A cave. [[Go in|Cave]]", 1),
//!         PassageRecord::new("Cave", "Dark.", 2),
//!     ]);
//!     let mut story = HeadlessStory::new(store, StoryConfig::default());
//!
//!     println!("{}", story.start().text);
//!     println!("{}", story.follow("Go in")?.text);
//!
//!     story.save_cookies("cookies.json").await?;
//!     Ok(())
//! }
//! ```

use crate::navigation::{MemoryNavigator, Navigator};
use crate::node::{self, Link, Node};
use crate::persist::{CookieJar, PersistError};
use crate::story::{Activation, RenderedPassage, Story, StoryConfig, StoryError};
use crate::store::Store;
use crate::value::Value;
use std::path::Path;
use thiserror::Error;

/// Errors from headless play.
#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("the story has not started")]
    NotStarted,

    #[error("no link reading \"{text}\" (available: {available:?})")]
    NoSuchLink { text: String, available: Vec<String> },

    #[error("link leaves the story: {url}")]
    External { url: String },

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Story error: {0}")]
    Story(#[from] StoryError),
}

/// A link as the reader sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub text: String,
    pub link: Link,
}

/// What the reader sees after each step.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryResponse {
    pub title: String,
    pub text: String,
    pub choices: Vec<String>,
    /// Address after the step.
    pub token: String,
}

/// An entry in the play transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    /// Link text followed, `None` for the opening passage.
    pub followed: Option<String>,
    pub title: String,
    pub text: String,
    pub step: usize,
}

/// A story played without a display.
pub struct HeadlessStory {
    story: Story<CookieJar, MemoryNavigator>,
    transcript: Vec<TranscriptEntry>,
}

impl HeadlessStory {
    pub fn new(store: Store, config: StoryConfig) -> Self {
        Self::with_cookies(store, config, CookieJar::new())
    }

    /// Play with previously remembered values.
    pub fn with_cookies(store: Store, config: StoryConfig, cookies: CookieJar) -> Self {
        Self {
            story: Story::new(store, config, cookies, MemoryNavigator::new()),
            transcript: Vec::new(),
        }
    }

    /// Play with remembered values loaded from a cookie file.
    pub async fn load_cookies(
        store: Store,
        config: StoryConfig,
        path: impl AsRef<Path>,
    ) -> Result<Self, HeadlessError> {
        let cookies = CookieJar::load_json(path).await?;
        Ok(Self::with_cookies(store, config, cookies))
    }

    /// Save remembered values to a cookie file.
    pub async fn save_cookies(&self, path: impl AsRef<Path>) -> Result<(), HeadlessError> {
        self.story.save_cookies(path).await?;
        Ok(())
    }

    /// Show the opening passage, restoring from the address if it holds
    /// a token.
    pub fn start(&mut self) -> StoryResponse {
        self.story.start();
        self.record(None)
    }

    /// Follow the first link whose text is `text`.
    pub fn follow(&mut self, text: &str) -> Result<StoryResponse, HeadlessError> {
        let choices = self.choices()?;
        let Some(choice) = choices.iter().find(|c| c.text == text).cloned() else {
            return Err(HeadlessError::NoSuchLink {
                text: text.to_string(),
                available: choices.into_iter().map(|c| c.text).collect(),
            });
        };

        match self.story.activate(&choice.link) {
            Activation::External { url } => Err(HeadlessError::External { url }),
            Activation::Displayed { .. } | Activation::Navigated(_) => {
                Ok(self.record(Some(text.to_string())))
            }
        }
    }

    /// Links on the current passage, in reading order.
    pub fn choices(&self) -> Result<Vec<Choice>, HeadlessError> {
        let current = self.current()?;
        let mut found = Vec::new();
        collect_choices(&current.nodes, &mut found);
        Ok(found)
    }

    pub fn current(&self) -> Result<&RenderedPassage, HeadlessError> {
        self.story.current().ok_or(HeadlessError::NotStarted)
    }

    /// Plain text of the current passage.
    pub fn text(&self) -> String {
        self.story.current().map(|c| c.text()).unwrap_or_default()
    }

    pub fn html(&self) -> String {
        self.story.current().map(|c| c.html()).unwrap_or_default()
    }

    /// A variable as the current history entry holds it.
    pub fn variable(&self, name: &str) -> Value {
        self.story.history().current().variables.get(name)
    }

    /// Simulate the reader editing the address, then poll.
    pub fn navigate_to(&mut self, token: &str) -> StoryResponse {
        self.story.navigator_mut().set_address(token);
        self.story.poll();
        self.record(Some(token.to_string()))
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn step_count(&self) -> usize {
        self.transcript.len()
    }

    pub fn story(&self) -> &Story<CookieJar, MemoryNavigator> {
        &self.story
    }

    pub fn story_mut(&mut self) -> &mut Story<CookieJar, MemoryNavigator> {
        &mut self.story
    }

    fn record(&mut self, followed: Option<String>) -> StoryResponse {
        let (title, text, choices) = match self.story.current() {
            Some(current) => {
                let mut found = Vec::new();
                collect_choices(&current.nodes, &mut found);
                (
                    current.title.clone(),
                    current.text(),
                    found.into_iter().map(|c| c.text).collect(),
                )
            }
            None => (String::new(), String::new(), Vec::new()),
        };

        self.transcript.push(TranscriptEntry {
            followed,
            title: title.clone(),
            text: text.clone(),
            step: self.transcript.len() + 1,
        });

        StoryResponse {
            title,
            text,
            choices,
            token: self.story.navigator().address(),
        }
    }
}

fn collect_choices(nodes: &[Node], found: &mut Vec<Choice>) {
    for item in nodes {
        if let Node::Element(e) = item {
            match e.link_target() {
                Some(link) => found.push(Choice {
                    text: node::text_content(&e.children),
                    link: link.clone(),
                }),
                None => collect_choices(&e.children, found),
            }
        }
    }
}
