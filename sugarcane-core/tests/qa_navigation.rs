//! QA tests for the host-facing surface: the address watch, link
//! activation, page elements and special passages.

use std::time::Duration;
use sugarcane_core::macros::MacroCall;
use sugarcane_core::node::{text_content, Node};
use sugarcane_core::testing::{assert_at, assert_text, StoryFixture};
use sugarcane_core::wikifier::Wikifier;
use sugarcane_core::{
    Activation, CookieJar, DisplayMode, Link, Macro, MacroError, MacroRegistry, MemoryNavigator,
    Navigator, PassageRecord, PollOutcome, SharedNavigator, Store, Story, StoryConfig,
};

/// `<<scrawl "Title" "text">>`: replace a passage's current text.
struct Scrawl;

impl Macro for Scrawl {
    fn handle(
        &self,
        _out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError> {
        if let [title, text] = call.params.as_slice() {
            if let Some(passage) = w.ctx.store.get_mut(title) {
                passage.set_text(text.as_str());
            }
        }
        Ok(())
    }
}

fn store() -> Store {
    Store::from_records(vec![
        PassageRecord::new("StoryTitle", "The Well", 1),
        PassageRecord::new("StoryAuthor", "by ''Someone''", 2),
        PassageRecord::new("Start", "Down: [[Well]]", 3),
        PassageRecord::new("Well", "Splash.", 4),
        PassageRecord::new("Styles", "body { color: black; }", 5).with_tags(["stylesheet"]),
        PassageRecord::new("Boot", "alert(1)", 6).with_tags(["script"]),
    ])
}

#[tokio::test]
async fn test_watch_restores_when_the_address_changes() {
    let navigator = SharedNavigator::new(MemoryNavigator::new());
    let config = StoryConfig::new().with_poll_interval(Duration::from_millis(5));
    let mut story = Story::new(store(), config, CookieJar::new(), navigator.clone());
    story.start();

    let outside = navigator.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        outside.lock().set_address("#3.4");
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), story.watch(|o| o.changed()))
        .await
        .expect("watch should see the change");
    assert_eq!(
        outcome,
        PollOutcome::Restored {
            token: "#3.4".to_string()
        }
    );
    assert_at(&story, "Well");
    assert_eq!(navigator.lock().title(), "The Well: Well");
}

#[test]
fn test_activate_passage_and_external_links() {
    let mut story = Story::in_memory(store(), StoryConfig::default());
    story.start();

    let well = Link::Passage {
        title: "Well".to_string(),
        broken: false,
    };
    assert_eq!(
        story.activate(&well),
        Activation::Displayed {
            title: "Well".to_string()
        }
    );
    assert_eq!(story.navigator().address(), "#3.4");

    let site = Link::External {
        url: "http://example.com".to_string(),
    };
    assert_eq!(
        story.activate(&site),
        Activation::External {
            url: "http://example.com".to_string()
        }
    );
    assert_at(&story, "Well");
}

#[test]
fn test_page_elements_and_titles() {
    let mut story = Story::in_memory(store(), StoryConfig::default());
    story.start();

    assert_eq!(story.title(), "The Well");
    assert_eq!(story.navigator().title(), "The Well");
    assert_eq!(text_content(&story.page_element("StoryAuthor", "")), "by Someone");
    assert_eq!(text_content(&story.page_element("StoryMenu", "''Menu''")), "Menu");
}

#[test]
fn test_stylesheets_cascade_in_title_order() {
    let store = Store::from_records(vec![
        PassageRecord::new("Start", "", 1),
        PassageRecord::new("Theme", "a { color: red; }", 2).with_tags(["stylesheet"]),
        PassageRecord::new("Base", "body { margin: 0; }", 3).with_tags(["stylesheet"]),
    ]);
    let story = Story::in_memory(store, StoryConfig::default());
    assert_eq!(
        story.stylesheets(),
        vec!["body { margin: 0; }", "a { color: red; }"]
    );
}

#[test]
fn test_stylesheets_and_scripts() {
    let story = Story::in_memory(store(), StoryConfig::default());
    assert_eq!(story.stylesheets(), vec!["body { color: black; }"]);
    assert_eq!(story.scripts(), vec!["Boot"]);
}

#[test]
fn test_restart_clears_everything() {
    let mut story = Story::in_memory(store(), StoryConfig::default());
    story.start();
    story.display("Well", DisplayMode::Normal);
    story.restart();

    assert!(story.current().is_none());
    assert_eq!(story.navigator().address(), "");
    assert_eq!(story.navigator().reloads(), 1);
    assert_eq!(story.poll(), PollOutcome::Unchanged);
}

#[test]
fn test_macro_rewrites_passage_until_restart() {
    let mut macros = MacroRegistry::builtin();
    macros.register("scrawl", Scrawl);
    let store = Store::from_records(vec![
        PassageRecord::new("Start", "<<scrawl \"Wall\" \"KILROY WAS HERE\">>[[Wall]]", 1),
        PassageRecord::new("Wall", "Bare brick.", 2),
    ]);
    let mut story = Story::in_memory(store, StoryConfig::default()).with_macros(macros);

    story.start();
    assert_eq!(story.store().get("Wall").raw_text(), "Bare brick.");
    story.display("Wall", DisplayMode::Normal);
    assert_text(&story, "KILROY WAS HERE");

    story.restart();
    assert_eq!(story.store().get("Wall").text(), "Bare brick.");
    story.display("Wall", DisplayMode::Normal);
    assert_text(&story, "Bare brick.");
}

#[test]
fn test_custom_start_passage() {
    let story = StoryFixture::new()
        .with_config(StoryConfig::new().with_start_passage("Intro"))
        .with_passage("Intro", "Hello")
        .start();
    assert_at(&story, "Intro");
    assert_eq!(story.navigator().address(), "");
}

#[test]
fn test_headless_address_edit() {
    let mut story = sugarcane_core::HeadlessStory::new(store(), StoryConfig::default());
    story.start();
    let response = story.navigate_to("#3.4");
    assert_eq!(response.title, "Well");
    assert_eq!(response.text, "Splash.");
    assert_eq!(story.transcript().len(), 2);
}
