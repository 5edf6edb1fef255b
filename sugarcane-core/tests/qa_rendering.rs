//! QA tests for passage rendering: markup, macros and their error paths.
//!
//! Passages are rendered inside small in-memory stories built with
//! `StoryFixture`, and checked through their plain text or HTML.

use sugarcane_core::testing::{assert_text, assert_variable, render_html, render_text, StoryFixture};
use sugarcane_core::{DisplayMode, Link, Store, StoryConfig};

#[test]
fn test_missing_passage_placeholder() {
    let store = Store::new();
    let missing = store.get("Nowhere");
    assert!(missing.is_missing());
    assert!(missing.tags().is_empty());
    assert!(!store.has("Nowhere"));
}

#[test]
fn test_rendering_is_idempotent_without_macros() {
    let mut story = StoryFixture::new()
        .with_passage("Start", "!Hall\nA ''long'' //dark// hall.\n*north\n*south")
        .start();
    let first = story.current().expect("started").nodes.clone();
    let second = story.rerender().expect("has a passage").nodes.clone();
    assert_eq!(first, second);
}

#[test]
fn test_if_else_branches() {
    assert_eq!(render_text("<<if true>>A<<else>>B<<endif>>"), "A");
    assert_eq!(render_text("<<if false>>A<<else>>B<<endif>>"), "B");
    assert_eq!(render_text("<<if false>>A<<endif>>after"), "after");
}

#[test]
fn test_nested_if_matches_its_own_endif() {
    let source = "<<if true>>X<<if false>>Y<<else>>Z<<endif>>W<<else>>V<<endif>>!";
    assert_eq!(render_text(source), "XZW!");
}

#[test]
fn test_if_with_variables_and_word_operators() {
    let mut story = StoryFixture::new()
        .with_passage(
            "Start",
            "<<set $gold = 12>><<if $gold gte 10 and not $cursed>>rich<<else>>poor<<endif>>",
        )
        .start();
    assert_text(&story, "rich");

    let nodes = story.render_source("<<if $gold lt 10 or $gold eq 12>>yes<<endif>>");
    assert_eq!(sugarcane_core::node::text_content(&nodes), "yes");
}

#[test]
fn test_set_then_print() {
    assert_eq!(render_text("<<set $x = 5>><<print $x + 1>>"), "6");
    assert_eq!(render_text("<<set $x = 5>><<set $x = $x * 2>><<print $x>>"), "10");
    assert_eq!(render_text("<<set $name = \"Ada\">>Hi <<print $name + \"!\">>"), "Hi Ada!");
}

#[test]
fn test_print_large_whole_number() {
    assert_eq!(render_text("<<print 1e20>>"), "100000000000000000000");
    assert_eq!(render_text("<<print 2 * 1e19>>"), "20000000000000000000");
}

#[test]
fn test_printed_text_is_rendered_as_markup() {
    assert_eq!(
        render_html("<<print \"''loud''\">>"),
        "<strong>loud</strong>"
    );
}

#[test]
fn test_missing_endif_is_an_inline_error() {
    let html = render_html("<<if true>>never closed");
    assert!(html.contains("can't find matching endif"));
    assert!(html.starts_with("<strong><span class=\"marked\">"));
}

#[test]
fn test_bad_expression_does_not_stop_the_render() {
    let text = render_text("before <<set $x = = 2>> after");
    assert!(text.starts_with("before "));
    assert!(text.ends_with(" after"));
    assert!(text.contains("bad expression"));
}

#[test]
fn test_unknown_macro() {
    assert_eq!(
        render_html("<<dance>>"),
        "<span class=\"marked\">macro not found: dance</span>"
    );
}

#[test]
fn test_broken_link_renders_without_failing() {
    let story = StoryFixture::new()
        .with_passage("Start", "[[Nowhere]] and [[Hall]]")
        .with_passage("Hall", "")
        .start();
    let current = story.current().expect("started");

    assert_eq!(
        current.links(),
        vec![
            &Link::Passage {
                title: "Nowhere".to_string(),
                broken: true
            },
            &Link::Passage {
                title: "Hall".to_string(),
                broken: false
            },
        ]
    );
    assert!(current.html().contains("class=\"brokenLink\""));
    assert!(current.html().contains("class=\"internalLink\""));
}

#[test]
fn test_pretty_link_to_unknown_target_is_external() {
    let html = render_html("[[Docs|http://example.com/docs]]");
    assert_eq!(
        html,
        "<a href=\"http://example.com/docs\" target=\"_blank\" class=\"externalLink\">Docs</a>"
    );
}

#[test]
fn test_display_transcludes_another_passage() {
    let story = StoryFixture::new()
        .with_passage("Start", "Before <<display \"Inner\">> after")
        .with_passage("Inner", "<<set $seen = true>>inside")
        .start();
    assert_text(&story, "Before inside after");
    assert_variable(&story, "seen", true);
}

#[test]
fn test_display_cycle_hits_the_depth_limit() {
    let story = StoryFixture::new()
        .with_config(StoryConfig::new().with_max_render_depth(8))
        .with_passage("Start", "<<display \"Start\">>")
        .start();
    assert!(story
        .current()
        .expect("started")
        .text()
        .contains("nested more than 8 deep"));
}

#[test]
fn test_runaway_inline_markup_hits_the_depth_limit() {
    let story = StoryFixture::new()
        .with_config(StoryConfig::new().with_max_render_depth(8))
        .with_passage("Start", &format!("{}end", "''//".repeat(20)))
        .start();
    let text = story.current().expect("started").text();
    assert!(text.contains("nested more than 8 deep"));
    assert!(!text.contains("end"));

    assert_eq!(render_html("''//deep//''"), "<strong><em>deep</em></strong>");
}

#[test]
fn test_silently_hides_output_but_keeps_effects() {
    let story = StoryFixture::new()
        .with_passage(
            "Start",
            "a<<silently>>hidden<<set $x = 3>><<silently>>deeper<<endsilently>>still hidden<<endsilently>>b",
        )
        .start();
    assert_text(&story, "ab");
    assert_variable(&story, "x", 3);
}

#[test]
fn test_choice_links_by_title() {
    let story = StoryFixture::new()
        .with_passage("Start", "<<choice \"Cellar\">>")
        .with_passage("Cellar", "")
        .start();
    assert_eq!(
        story.current().expect("started").html(),
        "<a href=\"javascript:void(0)\" class=\"internalLink\">Cellar</a>"
    );
}

#[test]
fn test_lists_headings_and_rules() {
    assert_eq!(
        render_html("*a\n*b"),
        "<ul><li>a</li><li>b</li></ul>"
    );
    assert_eq!(
        render_html("#one\n#two"),
        "<ol><li>one</li><li>two</li></ol>"
    );
    assert_eq!(render_html("!!Title\nrest"), "<h2>Title</h2>rest");
    assert_eq!(render_html("----\n"), "<hr>");
}

#[test]
fn test_simple_table() {
    assert_eq!(
        render_html("|a|b|\n|c|d|"),
        "<table><tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></tbody></table>"
    );
}

#[test]
fn test_inline_styles_and_comments() {
    assert_eq!(
        render_html("@@color:red;hot@@"),
        "<span style=\"color: red\">hot</span>"
    );
    assert_eq!(render_html("@@note@@"), "<span class=\"marked\">note</span>");
    assert_eq!(render_text("a/% hidden %/b"), "ab");
    assert_eq!(render_html("<html><b>raw</b></html>"), "<span><b>raw</b></span>");
}

#[test]
fn test_offscreen_display_renders_for_effects() {
    let mut story = StoryFixture::new()
        .with_passage("Start", "")
        .with_passage("Setup", "<<set $ready = true>>")
        .start();
    story.display("Setup", DisplayMode::Offscreen);
    assert_variable(&story, "ready", true);
    assert_eq!(story.navigator().title(), "Sugarcane");
}
