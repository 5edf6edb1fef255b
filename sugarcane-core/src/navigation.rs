//! The host's navigation surface: an address holding the resume token, a
//! document title, and the ability to reload from scratch.

use std::sync::{Arc, Mutex, MutexGuard};

/// What the story needs from the host's navigation.
pub trait Navigator: Send {
    /// The current address token, `""` when there is none.
    fn address(&self) -> String;

    fn set_address(&mut self, token: &str);

    /// Ask the host to start the story over from nothing.
    fn request_reload(&mut self);

    fn set_title(&mut self, title: &str);

    /// Bring the top of the newly shown passage into view.
    fn focus_top(&mut self) {}
}

/// A navigator that only records what it is told. Useful for headless
/// play and tests; an external change is simulated with `set_address`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryNavigator {
    address: String,
    title: String,
    reloads: usize,
    focus_count: usize,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an address already present, as after a bookmark.
    pub fn with_address(token: impl Into<String>) -> Self {
        Self {
            address: token.into(),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// How many reloads have been requested.
    pub fn reloads(&self) -> usize {
        self.reloads
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count
    }
}

impl Navigator for MemoryNavigator {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn set_address(&mut self, token: &str) {
        self.address = token.to_string();
    }

    fn request_reload(&mut self) {
        self.reloads += 1;
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn focus_top(&mut self) {
        self.focus_count += 1;
    }
}

/// A [`MemoryNavigator`] shared between the story and another owner, such
/// as a task changing the address while the story watches it.
#[derive(Debug, Clone, Default)]
pub struct SharedNavigator {
    inner: Arc<Mutex<MemoryNavigator>>,
}

impl SharedNavigator {
    pub fn new(navigator: MemoryNavigator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(navigator)),
        }
    }

    /// Lock the underlying navigator. A poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, MemoryNavigator> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for SharedNavigator {
    fn address(&self) -> String {
        self.lock().address()
    }

    fn set_address(&mut self, token: &str) {
        self.lock().set_address(token);
    }

    fn request_reload(&mut self) {
        self.lock().request_reload();
    }

    fn set_title(&mut self, title: &str) {
        self.lock().set_title(title);
    }

    fn focus_top(&mut self) {
        self.lock().focus_top();
    }
}

/// What one poll of the address found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The address matches what the story last saw.
    Unchanged,
    /// The address changed and history was rebuilt from it.
    Restored { token: String },
    /// The address changed to a token that could not be restored.
    RestoreFailed { token: String, reason: String },
    /// The address was cleared; the host was asked to reload.
    ReloadRequested,
}

impl PollOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, PollOutcome::Unchanged)
    }
}

/// Whether an address carries state to restore.
pub fn is_empty_address(address: &str) -> bool {
    address.is_empty() || address == "#"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_navigator_records_calls() {
        let mut nav = MemoryNavigator::with_address("#1");
        nav.set_address("#1.2");
        nav.set_title("Tale: Hall");
        nav.request_reload();
        nav.focus_top();

        assert_eq!(nav.address(), "#1.2");
        assert_eq!(nav.title(), "Tale: Hall");
        assert_eq!(nav.reloads(), 1);
        assert_eq!(nav.focus_count(), 1);
    }

    #[test]
    fn test_empty_addresses() {
        assert!(is_empty_address(""));
        assert!(is_empty_address("#"));
        assert!(!is_empty_address("#1"));
    }

    #[test]
    fn test_shared_navigator_sees_outside_changes() {
        let shared = SharedNavigator::default();
        let mut held = shared.clone();
        held.set_address("#1");
        shared.lock().set_address("#1.2");
        assert_eq!(held.address(), "#1.2");
    }
}
