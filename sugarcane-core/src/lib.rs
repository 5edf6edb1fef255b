//! Interactive fiction engine for hypertext stories.
//!
//! This crate provides:
//! - A passage store with title, id and tag lookup
//! - A wikitext renderer driven by a table of pattern formatters
//! - Story macros (`<<if>>`, `<<set>>`, `<<print>>`, `<<back>>` ...) over
//!   a small expression language
//! - Reader history with a resumable address token
//! - Remembered values that outlive a session
//!
//! # Quick Start
//!
//! ```ignore
//! use sugarcane_core::{DisplayMode, PassageRecord, Store, Story, StoryConfig};
//!
//! let store = Store::from_records(vec![
//!     PassageRecord::new("Start", "<<set $gold = 5>>You have <<print $gold>> gold. [[Spend it|Shop]]", 1),
//!     PassageRecord::new("Shop", "<<set $gold = $gold - 5>>Broke again. <<back>>", 2),
//! ]);
//!
//! let mut story = Story::in_memory(store, StoryConfig::default());
//! story.start();
//! println!("{}", story.current().unwrap().text());
//!
//! story.display("Shop", DisplayMode::Normal);
//! println!("resume at {}", story.history().current().token);
//! ```

pub mod expr;
pub mod headless;
pub mod history;
pub mod macros;
pub mod navigation;
pub mod node;
pub mod passage;
pub mod persist;
pub mod store;
pub mod story;
pub mod testing;
pub mod value;
pub mod wikifier;

// Primary public API
pub use headless::{HeadlessError, HeadlessStory};
pub use history::{History, HistoryEntry, TokenError};
pub use macros::{Macro, MacroError, MacroRegistry};
pub use navigation::{MemoryNavigator, Navigator, PollOutcome, SharedNavigator};
pub use node::{Element, Link, Node, Tag};
pub use passage::{Passage, PassageRecord};
pub use persist::{CookieJar, PersistError, PersistenceStore};
pub use store::{LookupField, SortField, SortOrder, Store};
pub use story::{
    Activation, Bookmark, DisplayMode, RenderedPassage, RestoreError, StartOutcome, Story,
    StoryConfig, StoryError,
};
pub use testing::StoryFixture;
pub use value::{Value, Variables};
pub use wikifier::{Formatter, FormatterTable};
