use super::*;

#[test]
fn slug_replaces_unsafe_characters() {
    assert_eq!(slug("Goblin Boss"), "Goblin_Boss");
    assert_eq!(slug("Dr. Who?"), "Dr._Who_");
    assert_eq!(slug("already_safe.name"), "already_safe.name");
}

#[test]
fn slug_drops_underscore_runs() {
    assert_eq!(slug("Goblin  Boss"), "GoblinBoss");
    assert_eq!(slug("a - b"), "ab");
    assert_eq!(slug("Zoë"), "Zo_");
    assert_eq!(slug("!!"), "");
}

#[test]
fn file_names_follow_role_and_suffix() {
    assert_eq!(
        file_name("Goblin", ViewKind::Avatar, "", ImageCodec::Webp),
        "Goblin.Avatar.webp"
    );
    assert_eq!(
        file_name("Goblin", ViewKind::Token, "abc123", ImageCodec::Png),
        "Goblin.Tokenabc123.png"
    );
}

#[test]
fn wildcard_numbering_is_padded() {
    let pattern = wildcard_pattern("tokens/npc", "Goblin", ImageCodec::Webp);
    assert_eq!(pattern, "tokens/npc/Goblin.Token-*.webp");
    assert_eq!(numbered_wildcard_name(&pattern, 0), "Goblin.Token-001.webp");
    assert_eq!(numbered_wildcard_name(&pattern, 41), "Goblin.Token-042.webp");
    assert_eq!(numbered_wildcard_name("x-*.png", 999), "x-1000.png");
    assert_eq!(wildcard_pattern("", "G", ImageCodec::Png), "G.Token-*.png");
}

#[test]
fn wildcard_match_handles_stars() {
    assert!(wildcard_match("Goblin.Token-*.webp", "Goblin.Token-001.webp"));
    assert!(wildcard_match("*", ""));
    assert!(wildcard_match("a*b*c", "aXXbYYc"));
    assert!(!wildcard_match("Goblin.Token-*.webp", "Goblin.Token-001.png"));
    assert!(!wildcard_match("abc", "abcd"));
    assert!(wildcard_match("abc", "abc"));
}

#[test]
fn cache_busters_are_replaced() {
    assert_eq!(strip_cache_buster("a/b.png?123"), "a/b.png");
    assert_eq!(with_cache_buster("a/b.png?123", "999"), "a/b.png?999");
    assert_eq!(with_cache_buster("a/b.png", "1"), "a/b.png?1");
}

#[test]
fn parent_dir_and_slashes() {
    assert_eq!(parent_dir("tokens/npc/g.png?1"), Some("tokens/npc"));
    assert_eq!(parent_dir("g.png"), None);
    assert_eq!(parent_dir("/g.png"), None);
    assert_eq!(trim_slashes("/a/b/"), "a/b");
}
