// tests/engine_tests.rs
//
// Protocol-level tests for the incremental parse engine, driven entirely
// through the public surface: build a small grammar, feed tokens one at a
// time, and inspect done-ness and rendering after each step.

use std::sync::Arc;

use lash::rules::{forward, GrammarBuilder, RuleId, Template};
use lash::session::Session;
use lash::token::{Token, TokenKind};
use lash::LashError;

fn session(build: impl FnOnce(&mut GrammarBuilder) -> RuleId) -> Session {
    let mut g = GrammarBuilder::new();
    let root = build(&mut g);
    Session::new(Arc::new(g.build().unwrap()), root)
}

// ---
// Leaves
// ---

#[test]
fn keyword_renders_its_message_not_the_lexeme() {
    let mut s = session(|g| g.keyword("new", TokenKind::New, ""));
    s.feed(Token::bare(TokenKind::New)).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "");
}

#[test]
fn value_renders_the_token_payload() {
    let mut s = session(|g| g.value("name", TokenKind::Id));
    s.feed(Token::with_text(TokenKind::Id, "total")).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "total");
}

#[test]
fn rejection_reports_the_offending_token() {
    let mut s = session(|g| g.value("name", TokenKind::Id));
    let err = s.feed(Token::with_text(TokenKind::Int, "3")).unwrap_err();
    assert!(matches!(err, LashError::Rejected { .. }));
    assert!(s.is_failed());
}

// ---
// Sequences: force-advance and backlog replay
// ---

#[test]
fn token_bounces_past_a_satisfied_star() {
    // Optional padding never sees the payload token; it lands on the next
    // item with nothing lost and nothing duplicated.
    let mut s = session(|g| {
        let ws = g.keyword("ws", TokenKind::Ws, "");
        let pad = g.star("pad", ws.into(), None);
        let id = g.value("id", TokenKind::Id);
        g.seq(
            "padded",
            vec![pad.into(), id.into()],
            Some(Template::new("%s", &[1])),
        )
    });
    s.feed(Token::bare(TokenKind::Ws)).unwrap();
    assert!(!s.root_is_done());
    s.feed(Token::with_text(TokenKind::Id, "ok")).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "ok");
}

#[test]
fn tokens_consumed_by_a_failed_extension_are_replayed() {
    // The head can be one id or an id/id pair. Feeding ID ID SEMI commits
    // the pair attempt, which dies at the semicolon; the second id must be
    // handed to the tail instead of vanishing.
    let mut s = session(|g| {
        let a = g.value("a", TokenKind::Id);
        let b = g.value("b", TokenKind::Id);
        let pair = g.seq(
            "pair",
            vec![a.into(), b.into()],
            Some(Template::new("%s/%s", &[0, 1])),
        );
        let solo = g.value("solo", TokenKind::Id);
        let head = g.alt("head", vec![solo.into(), pair.into()], None);
        let tail = g.value("tail", TokenKind::Id);
        let semi = g.keyword("semi", TokenKind::Semi, "");
        g.seq(
            "line",
            vec![head.into(), tail.into(), semi.into()],
            Some(Template::new("%s then %s", &[0, 1])),
        )
    });
    s.feed(Token::with_text(TokenKind::Id, "x")).unwrap();
    s.feed(Token::with_text(TokenKind::Id, "y")).unwrap();
    s.feed(Token::bare(TokenKind::Semi)).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "x then y");
}

#[test]
fn failure_at_the_last_item_is_final() {
    let mut s = session(|g| {
        let id = g.value("id", TokenKind::Id);
        let semi = g.keyword("semi", TokenKind::Semi, "");
        g.seq("line", vec![id.into(), semi.into()], None)
    });
    s.feed(Token::with_text(TokenKind::Id, "x")).unwrap();
    let err = s.feed(Token::with_text(TokenKind::Int, "1")).unwrap_err();
    assert!(matches!(err, LashError::Rejected { .. }));
}

// ---
// Alternation
// ---

#[test]
fn earliest_declared_winner_renders() {
    let mut s = session(|g| {
        let first = g.keyword("first", TokenKind::Id, "first");
        let second = g.keyword("second", TokenKind::Id, "second");
        g.alt("pick", vec![first.into(), second.into()], None)
    });
    s.feed(Token::with_text(TokenKind::Id, "anything")).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "first");
}

#[test]
fn a_branch_that_dies_stops_rendering() {
    // The shorter branch is declared second, but once the longer one is
    // killed by the extra token the survivor's text wins.
    let mut s = session(|g| {
        let id = g.value("id", TokenKind::Id);
        let solo = g.seq("solo", vec![id.into()], Some(Template::new("solo(%s)", &[0])));
        let id2 = g.value("id2", TokenKind::Id);
        let semi = g.keyword("semi", TokenKind::Semi, "");
        let full = g.seq(
            "full",
            vec![id2.into(), semi.into()],
            Some(Template::new("full(%s)", &[0])),
        );
        g.alt("pick", vec![solo.into(), full.into()], None)
    });
    s.feed(Token::with_text(TokenKind::Id, "x")).unwrap();
    assert_eq!(s.root_render(), "solo(x)");
    s.feed(Token::bare(TokenKind::Semi)).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "full(x)");
}

// ---
// Repetition
// ---

#[test]
fn star_accepts_emptiness_and_plus_does_not() {
    let star = session(|g| {
        let id = g.value("id", TokenKind::Id);
        g.star("ids", id.into(), None)
    });
    assert!(star.root_is_done());

    let mut plus = session(|g| {
        let id = g.value("id", TokenKind::Id);
        g.plus("ids", id.into(), None)
    });
    assert!(!plus.root_is_done());
    plus.feed(Token::with_text(TokenKind::Id, "one")).unwrap();
    assert!(plus.root_is_done());
}

#[test]
fn instances_confirm_one_at_a_time() {
    let mut s = session(|g| {
        let id = g.value("id", TokenKind::Id);
        let comma = g.keyword("comma", TokenKind::Comma, "");
        let item = g.seq(
            "item",
            vec![id.into(), comma.into()],
            Some(Template::new("<%s>", &[0])),
        );
        g.star("items", item.into(), None)
    });
    for name in ["a", "b", "c"] {
        s.feed(Token::with_text(TokenKind::Id, name)).unwrap();
        s.feed(Token::bare(TokenKind::Comma)).unwrap();
    }
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "<a><b><c>");
}

#[test]
fn a_half_finished_instance_kills_the_repeat() {
    let mut s = session(|g| {
        let id = g.value("id", TokenKind::Id);
        let comma = g.keyword("comma", TokenKind::Comma, "");
        let item = g.seq("item", vec![id.into(), comma.into()], None);
        g.star("items", item.into(), None)
    });
    s.feed(Token::with_text(TokenKind::Id, "a")).unwrap();
    s.feed(Token::bare(TokenKind::Comma)).unwrap();
    s.feed(Token::with_text(TokenKind::Id, "b")).unwrap();
    let err = s.feed(Token::with_text(TokenKind::Int, "9")).unwrap_err();
    assert!(matches!(err, LashError::Rejected { .. }));
}

// ---
// Forward references
// ---

#[test]
fn forward_references_resolve_by_name() {
    // `wrapped` is referenced before `inner` exists.
    let mut s = session(|g| {
        let lparen = g.keyword("lparen", TokenKind::Lparen, "");
        let rparen = g.keyword("rparen", TokenKind::Rparen, "");
        let root = g.seq(
            "wrapped",
            vec![lparen.into(), forward("inner"), rparen.into()],
            Some(Template::new("[%s]", &[1])),
        );
        g.value("inner", TokenKind::Int);
        root
    });
    s.feed(Token::bare(TokenKind::Lparen)).unwrap();
    s.feed(Token::with_text(TokenKind::Int, "7")).unwrap();
    s.feed(Token::bare(TokenKind::Rparen)).unwrap();
    assert!(s.root_is_done());
    assert_eq!(s.root_render(), "[7]");
}

#[test]
fn unresolved_forward_reference_fails_construction() {
    let mut g = GrammarBuilder::new();
    let lparen = g.keyword("lparen", TokenKind::Lparen, "");
    g.seq("wrapped", vec![lparen.into(), forward("nowhere")], None);
    let err = g.build().unwrap_err();
    assert!(matches!(err, LashError::Construction { .. }));
}

#[test]
fn ambiguous_forward_reference_fails_construction() {
    let mut g = GrammarBuilder::new();
    g.value("inner", TokenKind::Int);
    g.value("inner", TokenKind::Id);
    let lparen = g.keyword("lparen", TokenKind::Lparen, "");
    g.seq("wrapped", vec![lparen.into(), forward("inner")], None);
    let err = g.build().unwrap_err();
    assert!(matches!(err, LashError::Construction { .. }));
}

// ---
// Templates
// ---

#[test]
fn template_reorders_slots() {
    let t = Template::new("(%s %s %s)", &[2, 0, 4]);
    let rendered = t.render(|slot| match slot {
        0 => "lhs".to_string(),
        2 => "op".to_string(),
        4 => "rhs".to_string(),
        _ => String::new(),
    });
    assert_eq!(rendered, "(op lhs rhs)");
}
