//! QA tests for remembered values and their cookie files.

use std::time::Duration;
use sugarcane_core::headless::HeadlessStory;
use sugarcane_core::persist::PersistenceStore;
use sugarcane_core::testing::{assert_variable, StoryFixture};
use sugarcane_core::{CookieJar, PassageRecord, Store, StoryConfig};
use tempfile::TempDir;

fn remembering(text: &str) -> StoryFixture {
    StoryFixture::new()
        .with_passage("StoryTitle", "Lantern")
        .with_passage("Start", text)
}

#[test]
fn test_remember_persists_under_story_prefix() {
    let story = remembering("<<remember $gold = 7>>").start();
    assert_variable(&story, "gold", 7);
    assert_eq!(
        story.persistence().get_all("Lantern_"),
        vec![("Lantern_gold".to_string(), "7".to_string())]
    );
}

#[test]
fn test_remembered_values_seed_the_next_session() {
    let first = remembering("<<remember $met = true>>").start();
    let cookies = first.persistence().clone();

    let second = remembering("<<print $met>>").with_cookies(cookies).start();
    assert_variable(&second, "met", true);
    assert_eq!(second.current().expect("started").text(), "true");
}

#[test]
fn test_remembered_string_with_quotes_round_trips() {
    let first = remembering(r#"<<remember $motto = "say \"hi\" \\ wave">>"#).start();
    assert_variable(&first, "motto", r#"say "hi" \ wave"#);
    assert_eq!(
        first.persistence().get_all("Lantern_")[0].1,
        r#""say \"hi\" \\ wave""#
    );

    let second = remembering("").with_cookies(first.persistence().clone()).start();
    assert_variable(&second, "motto", r#"say "hi" \ wave"#);
}

#[test]
fn test_remembered_large_number_round_trips() {
    let first = remembering("<<remember $stars = 1e20>>").start();
    assert_eq!(
        first.persistence().get_all("Lantern_")[0].1,
        "100000000000000000000"
    );

    let second = remembering("<<print $stars>>")
        .with_cookies(first.persistence().clone())
        .start();
    assert_variable(&second, "stars", 1e20);
    assert_eq!(second.current().expect("started").text(), "100000000000000000000");
}

#[test]
fn test_remember_without_story_title_uses_default_prefix() {
    let story = StoryFixture::new()
        .with_passage("Start", "<<remember $seen = 1>>")
        .start();
    assert_eq!(story.persist_prefix(), "__jonah_");
    assert_eq!(story.persistence().get_all("__jonah_").len(), 1);
}

#[test]
fn test_remember_undefined_is_an_error() {
    let story = remembering("<<remember $ghost>>").start();
    let text = story.current().expect("started").text();
    assert!(text.contains("can't remember $ghost (undefined)"));
    assert!(story.persistence().is_empty());
}

#[test]
fn test_expired_values_are_not_replayed() {
    let mut cookies = CookieJar::new();
    cookies.set(
        "Lantern_old",
        "1",
        std::time::UNIX_EPOCH + Duration::from_secs(60),
    );
    let story = remembering("").with_cookies(cookies).start();
    assert_variable(&story, "old", sugarcane_core::Value::Undefined);
}

#[tokio::test]
async fn test_cookie_file_carries_values_between_headless_sessions() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("cookies.json");

    let store = || {
        Store::from_records(vec![
            PassageRecord::new("StoryTitle", "Lantern", 1),
            PassageRecord::new("Start", "<<if $visits>>Back again<<else>>First time<<endif>>", 2),
            PassageRecord::new("Leave", "<<remember $visits = 1>>Bye", 3),
        ])
    };

    let mut first = HeadlessStory::new(store(), StoryConfig::default());
    assert_eq!(first.start().text, "First time");
    first.story_mut().display("Leave", sugarcane_core::DisplayMode::Normal);
    first.save_cookies(&path).await.expect("Save should succeed");

    let mut second = HeadlessStory::load_cookies(store(), StoryConfig::default(), &path)
        .await
        .expect("Load should succeed");
    assert_eq!(second.start().text, "Back again");
}
