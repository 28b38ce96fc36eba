use super::*;
use crate::session::{request::ActorKind, storage::StoragePath};

fn outcome(avatar: Option<&str>, token: Option<&str>) -> TokenizeOutcome {
    TokenizeOutcome {
        avatar_path: avatar.map(str::to_string),
        token_path: token.map(str::to_string),
        avatar_uploaded: avatar.is_some(),
        token_uploaded: token.is_some(),
        avatar_upload_directory: StoragePath::parse("[data] pcs").unwrap(),
        token_upload_directory: StoragePath::parse("[data] tokens").unwrap(),
    }
}

#[test]
fn plain_token_gets_cache_busted_paths() {
    let request = TokenRequest::new("Goblin Boss", ActorKind::Npc);
    let update = RecordUpdate::build(
        &outcome(Some("pcs/Goblin_Boss.Avatar.webp?1"), Some("tokens/Goblin_Boss.Token.webp")),
        &request,
        &TokenizerConfig::default(),
        "42",
    );
    assert_eq!(
        update.avatar,
        Some(("img".to_string(), "pcs/Goblin_Boss.Avatar.webp?42".to_string()))
    );
    assert_eq!(
        update.prototype_texture.as_deref(),
        Some("tokens/Goblin_Boss.Token.webp?42")
    );
    assert!(update.token_pattern.is_none());
    assert!(update.ring.is_none());
}

#[test]
fn ring_follows_config_or_existing_flag() {
    let config = TokenizerConfig {
        auto_apply_dynamic_token_ring: true,
        ..TokenizerConfig::default()
    };
    let request = TokenRequest::new("G", ActorKind::Pc);
    let update = RecordUpdate::build(&outcome(None, Some("t/G.png")), &request, &config, "7");
    assert_eq!(
        update.ring,
        Some(RingUpdate {
            subject_texture: "t/G.png?7".to_string()
        })
    );

    let request = TokenRequest {
        ring_enabled: true,
        ..TokenRequest::new("G", ActorKind::Pc)
    };
    let update = RecordUpdate::build(
        &outcome(None, Some("t/G.png")),
        &request,
        &TokenizerConfig::default(),
        "7",
    );
    assert!(update.ring.is_some());
}

#[test]
fn wildcard_without_pattern_gets_one() {
    let request = TokenRequest {
        wildcard: true,
        token_path: Some("tokens/goblin.png".to_string()),
        ..TokenRequest::new("Goblin Boss", ActorKind::Npc)
    };
    let update = RecordUpdate::build(
        &outcome(None, Some("tokens/Goblin_Boss.Token-001.webp")),
        &request,
        &TokenizerConfig::default(),
        "1",
    );
    assert!(update.prototype_texture.is_none());
    assert_eq!(
        update.token_pattern.as_deref(),
        Some("tokens/Goblin_Boss.Token-*.webp")
    );

    let request = TokenRequest {
        token_path: Some("tokens/Goblin_Boss.Token-*.webp".to_string()),
        ..request
    };
    let update = RecordUpdate::build(
        &outcome(None, Some("tokens/Goblin_Boss.Token-002.webp")),
        &request,
        &TokenizerConfig::default(),
        "1",
    );
    assert!(update.is_empty());
}

#[test]
fn patch_uses_host_field_layout() {
    let update = RecordUpdate {
        avatar: Some(("system.keyArt".to_string(), "a.png?1".to_string())),
        prototype_texture: Some("t.png?1".to_string()),
        token_pattern: None,
        ring: Some(RingUpdate {
            subject_texture: "t.png?1".to_string(),
        }),
    };
    let patch = update.to_patch();
    assert_eq!(patch["system"]["keyArt"], "a.png?1");
    assert_eq!(patch["prototypeToken"]["texture"]["src"], "t.png?1");
    assert_eq!(patch["prototypeToken"]["ring"]["enabled"], true);
    assert_eq!(patch["prototypeToken"]["ring"]["subject"]["texture"], "t.png?1");
    assert!(patch.get("token").is_none());
}

#[test]
fn json_record_is_deep_merged() {
    let mut record = json!({
        "name": "Goblin",
        "img": "old.png",
        "prototypeToken": { "texture": { "src": "old-token.png", "scaleX": 1 }, "disposition": -1 }
    });
    let update = RecordUpdate {
        avatar: Some(("img".to_string(), "new.png?5".to_string())),
        prototype_texture: Some("new-token.png?5".to_string()),
        ..RecordUpdate::default()
    };
    record.apply(&update).unwrap();
    assert_eq!(record["img"], "new.png?5");
    assert_eq!(record["prototypeToken"]["texture"]["src"], "new-token.png?5");
    assert_eq!(record["prototypeToken"]["texture"]["scaleX"], 1);
    assert_eq!(record["prototypeToken"]["disposition"], -1);
    assert_eq!(record["name"], "Goblin");

    let mut not_object = json!([1, 2]);
    assert!(not_object.apply(&update).is_err());
}

#[test]
fn cache_tag_is_numeric() {
    let tag = cache_tag_now();
    assert!(!tag.is_empty());
    assert!(tag.chars().all(|c| c.is_ascii_digit()));
}
