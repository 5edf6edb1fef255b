//! QA tests for history, resume tokens and replay.
//!
//! These tests drive a story through link activation and token restores
//! and check the variable isolation between history entries.

use sugarcane_core::history::{decode_token, encode_token};
use sugarcane_core::testing::{
    assert_at, assert_links_to, assert_no_link_to, assert_variable, find_back_link, find_link,
    StoryFixture,
};
use sugarcane_core::{
    Activation, DisplayMode, Link, Navigator, PassageRecord, PollOutcome, RestoreError,
    StartOutcome, Store, Story, StoryConfig, Value,
};

fn corridor() -> StoryFixture {
    StoryFixture::new()
        .with_passage("Start", "<<set $x = 5>>[[Next]]")
        .with_passage("Next", "<<set $x = $x + 1>>[[Last]] <<back>>")
        .with_passage("Last", "<<print $x>> <<back \"Start\">>")
}

#[test]
fn test_token_round_trip() {
    for ids in [vec![], vec![1], vec![1, 2, 3], vec![35, 36, 46655, 7]] {
        let token = encode_token(&ids);
        assert_eq!(decode_token(&token).expect("valid token"), ids);
    }
}

#[test]
fn test_history_token_matches_visit_order() {
    let mut story = corridor().start();
    story.display("Next", DisplayMode::Normal);
    story.display("Last", DisplayMode::Normal);
    story.display("Next", DisplayMode::Normal);

    let token = story.history().current().token.clone();
    assert_eq!(token, "#1.2.3.2");
    assert_eq!(decode_token(&token).expect("valid token"), story.history().passage_ids());
}

#[test]
fn test_variables_are_copied_forward_not_back() {
    let mut story = corridor().start();
    assert_variable(&story, "x", 5);

    story.display("Next", DisplayMode::Normal);
    assert_variable(&story, "x", 6);

    let history = story.history();
    assert_eq!(history.get(1).expect("start entry").variables.get("x"), Value::from(5));
    assert!(history.get(2).expect("sentinel").variables.get("x") == Value::Undefined);
}

#[test]
fn test_restore_replays_side_effects() {
    let mut story = corridor().start();
    story.restore("#1.2.3").expect("restorable");
    assert_at(&story, "Last");
    assert_variable(&story, "x", 6);
    assert_eq!(story.current().expect("displayed").text(), "6 \u{ab} Back");
    assert_eq!(story.navigator().address(), "#1.2.3");
}

#[test]
fn test_restore_accepts_upper_case_ids() {
    let store = Store::from_records(vec![
        PassageRecord::new("Start", "", 1),
        PassageRecord::new("Vault", "", 11),
    ]);
    let mut story = Story::in_memory(store, StoryConfig::default());

    story.restore("#1.B").expect("restorable");
    assert_at(&story, "Vault");
    assert_eq!(story.history().passage_ids(), vec![1, 11]);
    assert_eq!(story.navigator().address(), "#1.b");
}

#[test]
fn test_start_restores_from_address() {
    let mut story = corridor().with_address("#1.2").build();
    assert_eq!(story.start(), StartOutcome::Restored);
    assert_at(&story, "Next");
    assert_variable(&story, "x", 6);
}

#[test]
fn test_start_falls_back_on_bad_token() {
    let mut story = corridor().with_address("#1.9z").build();
    let outcome = story.start();
    assert!(matches!(
        outcome,
        StartOutcome::RestoreFailed(RestoreError::UnknownPassage { .. })
    ));
    assert_at(&story, "Start");
    assert_eq!(story.history().passage_ids(), vec![1]);
}

#[test]
fn test_back_link_targets() {
    let mut story = corridor().start();
    story.display("Next", DisplayMode::Normal);
    assert_eq!(
        find_back_link(&story),
        Some(Link::Back {
            token: "#1".to_string()
        })
    );

    story.display("Last", DisplayMode::Normal);
    assert_eq!(
        find_back_link(&story),
        Some(Link::Back {
            token: "#1".to_string()
        })
    );
}

#[test]
fn test_back_without_history_is_an_error() {
    let story = StoryFixture::new()
        .with_passage("Start", "<<back>> <<back \"Elsewhere\">>")
        .start();
    let text = story.current().expect("started").text();
    assert!(text.contains("can't go back from the first passage read"));
    assert!(text.contains("can't find passage \"Elsewhere\" in history"));
}

#[test]
fn test_following_a_back_link() {
    let mut story = corridor().start();
    story.display("Next", DisplayMode::Normal);
    story.display("Last", DisplayMode::Normal);

    let back = find_back_link(&story).expect("back link");
    let activation = story.activate(&back);
    assert_eq!(
        activation,
        Activation::Navigated(PollOutcome::Restored {
            token: "#1".to_string()
        })
    );
    assert_at(&story, "Start");
    assert_eq!(story.history().passage_ids(), vec![1]);
    // Returning to the start passage leaves the address alone; polling
    // again must not restore a second time.
    assert_eq!(story.poll(), PollOutcome::Unchanged);
}

#[test]
fn test_actions_are_suppressed_after_use() {
    let mut story = StoryFixture::new()
        .with_passage("Start", "<<actions \"Go\" \"Wait\">>")
        .with_passage("Go", "You went. [[Start]]")
        .with_passage("Wait", "")
        .start();
    assert_links_to(&story, "Go");

    let go = find_link(&story, "Go").expect("action link");
    assert!(matches!(go, Link::Action { .. }));
    story.activate(&go);
    assert_at(&story, "Go");

    let home = find_link(&story, "Start").expect("link home");
    story.activate(&home);
    assert_at(&story, "Start");
    assert_no_link_to(&story, "Go");
    assert_links_to(&story, "Wait");

    // The same state rebuilt from its token hides the used action too.
    let token = story.history().current().token.clone();
    assert_eq!(token, "#1.2.1");
    story.restore(&token).expect("restorable");
    assert_no_link_to(&story, "Go");
    assert_links_to(&story, "Wait");
}

fn action_links(story: &Story) -> usize {
    story
        .current()
        .expect("displayed")
        .links()
        .into_iter()
        .filter(|link| matches!(link, Link::Action { .. }))
        .count()
}

#[test]
fn test_plain_link_to_an_action_target_keeps_the_action() {
    let mut story = StoryFixture::new()
        .with_passage("Start", "<<actions \"Go\">> or [[Go]]")
        .with_passage("Go", "Gone. [[Start]]")
        .start();
    assert_eq!(action_links(&story), 1);

    story.activate(&Link::Passage {
        title: "Go".to_string(),
        broken: false,
    });
    let home = find_link(&story, "Start").expect("link home");
    story.activate(&home);
    assert_eq!(action_links(&story), 1);

    let token = story.history().current().token.clone();
    assert_eq!(token, "#1.2.1");
    story.restore(&token).expect("restorable");
    assert_eq!(action_links(&story), 1);
}

#[test]
fn test_poll_restores_changed_address() {
    let mut story = corridor().start();
    story.display("Next", DisplayMode::Normal);
    assert_eq!(story.poll(), PollOutcome::Unchanged);

    story.navigator_mut().set_address("#1.2.3");
    assert_eq!(
        story.poll(),
        PollOutcome::Restored {
            token: "#1.2.3".to_string()
        }
    );
    assert_at(&story, "Last");
    assert_eq!(story.poll(), PollOutcome::Unchanged);
}

#[test]
fn test_poll_with_cleared_address_requests_reload() {
    let mut story = corridor().start();
    story.display("Next", DisplayMode::Normal);

    story.navigator_mut().set_address("");
    assert_eq!(story.poll(), PollOutcome::ReloadRequested);
    assert_eq!(story.navigator().reloads(), 1);
}

#[test]
fn test_poll_reports_unrestorable_address() {
    let mut story = corridor().start();
    story.navigator_mut().set_address("#zzz");
    assert!(matches!(story.poll(), PollOutcome::RestoreFailed { .. }));
    assert_eq!(story.poll(), PollOutcome::Unchanged);
}

#[test]
fn test_bookmarks_from_history() {
    let mut story = StoryFixture::new()
        .with_passage("Start", "")
        .with_tagged_passage("Camp", "You make camp by the river.", &["bookmark"])
        .with_passage("River", "")
        .start();
    story.display("Camp", DisplayMode::Normal);
    story.display("River", DisplayMode::Normal);

    let bookmarks = story.bookmarks();
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].title, "Camp");
    assert_eq!(bookmarks[0].token, "#1.2");
    assert!(bookmarks[0].excerpt.ends_with("..."));
}
