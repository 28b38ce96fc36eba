use std::io::Cursor;

use serde_json::json;

use super::*;
use crate::{
    assets::fetch::MemoryFetcher,
    compose::layer::Slot,
    config::settings::{BUILTIN_FRAME_NPC, BUILTIN_FRAME_TINT, DEFAULT_FALLBACK_IMAGE},
    session::storage::{Grants, MemoryStorage},
};

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><rect width="8" height="8" fill="#808080"/></svg>"##;

fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// Opaque ring around a transparent center.
fn ring_png(size: u32) -> Vec<u8> {
    let c = size as f64 / 2.0;
    let img = image::RgbaImage::from_fn(size, size, |x, y| {
        let d = ((x as f64 + 0.5 - c).powi(2) + (y as f64 + 0.5 - c).powi(2)).sqrt();
        if d > c * 0.75 {
            image::Rgba([200, 160, 40, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn config() -> TokenizerConfig {
    TokenizerConfig {
        token_size: 32,
        portrait_size: 16,
        image_save_type: crate::compose::export::ImageCodec::Png,
        default_token_offset: -2.0,
        ..TokenizerConfig::default()
    }
}

fn fetcher() -> MemoryFetcher {
    MemoryFetcher::new()
        .with("art/goblin.png", png(40, 20, [255, 0, 0, 255]))
        .with("art/goblin-token.png", png(32, 32, [0, 0, 255, 255]))
        .with(BUILTIN_FRAME_NPC, ring_png(32))
        .with(BUILTIN_FRAME_TINT, ring_png(32))
        .with("picked/frame-silver.png", ring_png(32))
        .with(DEFAULT_FALLBACK_IMAGE, PLACEHOLDER_SVG.as_bytes().to_vec())
}

fn request() -> TokenRequest {
    TokenRequest {
        avatar_path: Some("art/goblin.png".to_string()),
        token_path: Some("art/goblin-token.png".to_string()),
        ..TokenRequest::new("Goblin Boss", ActorKind::Npc)
    }
}

fn open(
    config: TokenizerConfig,
    request: TokenRequest,
) -> Tokenizer<MemoryFetcher, MemoryStorage> {
    Tokenizer::open(
        config,
        request,
        fetcher(),
        MemoryStorage::new(),
        &Grants::ALL,
        Vec::new(),
    )
    .unwrap()
}

fn loaded() -> Tokenizer<MemoryFetcher, MemoryStorage> {
    let mut session = open(config(), request());
    session.load_images().unwrap();
    session
}

#[test]
fn open_resolves_directories_and_file_names() {
    let session = open(config(), request());
    assert_eq!(
        session.file_names(),
        ("Goblin_Boss.Avatar.png", "Goblin_Boss.Token.png")
    );
    let (avatar_dir, token_dir) = session.upload_directories();
    assert_eq!(avatar_dir.to_string(), "[data] tokenizer/npc_images");
    assert_eq!(token_dir, avatar_dir);
    assert!(session.modifies(ViewKind::Avatar));
    assert!(session.view(ViewKind::Avatar).is_err());
    assert_eq!(session.view(ViewKind::Token).unwrap().layers().len(), 0);
}

#[test]
fn target_folder_and_suffix_override_defaults() {
    let request = TokenRequest {
        target_folder: Some("[data] scene/tokens".to_string()),
        name_suffix: "tok42".to_string(),
        ..request()
    };
    let session = open(config(), request);
    assert_eq!(session.file_names().1, "Goblin_Boss.Tokentok42.png");
    assert_eq!(session.upload_directories().1.current, "scene/tokens");
}

#[test]
fn wildcard_tokens_are_numbered_after_existing_files() {
    let blob = EncodedImage {
        codec: crate::compose::export::ImageCodec::Png,
        mime: "image/png",
        bytes: vec![1],
    };
    let storage = MemoryStorage::new()
        .with_file("tokens/Goblin_Boss.Token-001.png", blob.clone())
        .with_file("tokens/Goblin_Boss.Token-002.png", blob);
    let request = TokenRequest {
        wildcard: true,
        token_path: Some("tokens/goblin.png".to_string()),
        ..request()
    };
    let mut session = Tokenizer::open(
        config(),
        request,
        fetcher(),
        storage,
        &Grants::ALL,
        Vec::new(),
    )
    .unwrap();
    assert_eq!(session.file_names().1, "Goblin_Boss.Token-003.png");
    assert_eq!(session.upload_directories().1.current, "tokens");

    session.load_images().unwrap();
    let token = session.view(ViewKind::Token).unwrap();
    assert_eq!(token.layers().len(), 1);
    assert!(token.layer(Slot::Frame).is_some());
}

#[test]
fn missing_upload_rights() {
    let strict = TokenizerConfig {
        disable_player: true,
        ..config()
    };
    let err = Tokenizer::open(
        strict,
        request(),
        fetcher(),
        MemoryStorage::new(),
        &Grants::NONE,
        Vec::new(),
    )
    .unwrap_err();
    assert!(matches!(err, TokenizerError::MissingPermission(_)));

    assert!(
        Tokenizer::open(
            config(),
            request(),
            fetcher(),
            MemoryStorage::new(),
            &Grants::NONE,
            Vec::new(),
        )
        .is_ok()
    );
}

#[test]
fn invalid_requests_are_rejected() {
    let err = Tokenizer::open(
        config(),
        TokenRequest::new("  ", ActorKind::Pc),
        fetcher(),
        MemoryStorage::new(),
        &Grants::ALL,
        Vec::new(),
    )
    .unwrap_err();
    assert!(matches!(err, TokenizerError::Validation(_)));

    let err = Tokenizer::open(
        config(),
        TokenRequest::new("!!", ActorKind::Pc),
        fetcher(),
        MemoryStorage::new(),
        &Grants::ALL,
        Vec::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("file name"));
}

#[test]
fn load_images_seeds_both_views() {
    let mut session = open(config(), request());
    let report = session.load_images().unwrap();
    assert_eq!(report, LoadReport::default());

    let token = session.view(ViewKind::Token).unwrap();
    assert_eq!(token.layers().len(), 2);
    let bg = token.layer(Slot::Background).unwrap();
    assert_eq!(bg.transform().offset, Vec2::new(-2.0, -2.0));
    let frame = token.layer(Slot::Frame).unwrap().flags();
    assert!(frame.on_top && frame.masked);
    assert_eq!(frame.tint_color, Some(session.config().default_frame_tint_hostile));
    assert!(!frame.tint_as_overlay);

    let avatar = session.view(ViewKind::Avatar).unwrap();
    assert_eq!(avatar.size().px(), 40);
    assert_eq!(avatar.layers().len(), 1);
}

#[test]
fn default_color_layer_goes_beneath_the_token() {
    let cfg = TokenizerConfig {
        default_color_layer: true,
        ..config()
    };
    let mut session = open(cfg, request());
    session.load_images().unwrap();
    let token = session.view(ViewKind::Token).unwrap();
    assert_eq!(token.layers()[0].slot(), Slot::Tint);
    assert_eq!(token.layers().len(), 3);
}

#[test]
fn unloadable_images_fall_back_to_placeholder() {
    let request = TokenRequest {
        token_path: Some("art/missing.png".to_string()),
        avatar_path: None,
        ..request()
    };
    let mut session = open(config(), request);
    let report = session.load_images().unwrap();
    assert!(report.token_fallback);
    assert!(report.avatar_fallback);
    assert_eq!(session.view(ViewKind::Avatar).unwrap().size().px(), 16);
}

#[test]
fn missing_frame_is_reported_not_fatal() {
    let cfg = TokenizerConfig {
        default_frame_npc: "frames/nowhere.png".to_string(),
        ..config()
    };
    let mut session = open(cfg, request());
    let report = session.load_images().unwrap();
    assert!(report.frame_error.unwrap().contains("frames/nowhere.png"));
    assert!(session.view(ViewKind::Token).unwrap().layer(Slot::Frame).is_none());
}

#[test]
fn frame_and_tint_follow_kind_and_disposition() {
    let neutral = TokenRequest {
        disposition: Disposition::Neutral,
        ..request()
    };
    let session = open(config(), neutral);
    assert_eq!(session.default_frame_path(), session.config().default_frame_neutral);
    assert_eq!(session.frame_tint_color(), session.config().default_frame_tint_neutral);

    let friendly = TokenRequest {
        disposition: Disposition::Friendly,
        ..request()
    };
    let session = open(config(), friendly);
    assert_eq!(session.frame_tint_color(), session.config().default_frame_tint_friendly);

    let pc = TokenRequest::new("Hero", ActorKind::Pc);
    let session = open(config(), pc);
    assert_eq!(session.default_frame_path(), session.config().default_frame_pc);
    assert_eq!(session.frame_tint_color(), session.config().default_frame_tint_pc);
    assert_eq!(
        session.upload_directories().0.current,
        "tokenizer/pc_images"
    );
}

#[test]
fn tinted_default_frame_uses_overlay() {
    let cfg = TokenizerConfig {
        frame_tint: true,
        ..config()
    };
    let mut session = open(cfg, request());
    assert_eq!(session.default_frame_path(), BUILTIN_FRAME_TINT);
    session.load_images().unwrap();
    let frame = session
        .view(ViewKind::Token)
        .unwrap()
        .layer(Slot::Frame)
        .unwrap()
        .flags();
    assert!(frame.tint_as_overlay);

    session
        .dispatch(Command::SelectFrame {
            path: "picked/frame-silver.png".to_string(),
        })
        .unwrap();
    let frame = session
        .view(ViewKind::Token)
        .unwrap()
        .layer(Slot::Frame)
        .unwrap()
        .flags();
    assert!(!frame.tint_as_overlay);
    assert_eq!(session.frames().custom().len(), 1);
}

#[test]
fn image_commands_route_to_views() {
    let mut session = loaded();
    let out = session
        .dispatch(Command::Upload {
            target: ViewKind::Avatar,
            bytes: png(8, 8, [0, 255, 0, 255]),
        })
        .unwrap();
    let CommandOutcome::Layer(id) = out else {
        panic!("expected a layer");
    };
    let avatar = session.view(ViewKind::Avatar).unwrap();
    assert_eq!(avatar.layer(Slot::Background).unwrap().id(), id);
    assert_eq!(avatar.size().px(), 40);

    session
        .dispatch(Command::Download {
            target: ViewKind::Token,
            url: "art/goblin.png".to_string(),
        })
        .unwrap();
    assert!(
        session
            .dispatch(Command::Download {
                target: ViewKind::Token,
                url: "art/nothing.png".to_string(),
            })
            .unwrap_err()
            .is_decode()
    );

    assert!(
        session
            .dispatch(Command::Upload {
                target: ViewKind::Token,
                bytes: b"not an image".to_vec(),
            })
            .unwrap_err()
            .is_decode()
    );
}

#[test]
fn paste_follows_paste_target() {
    let mut session = loaded();
    assert_eq!(session.paste_target(), ViewKind::Token);
    let CommandOutcome::Layer(id) = session
        .dispatch(Command::Paste {
            bytes: png(4, 4, [9, 9, 9, 255]),
        })
        .unwrap()
    else {
        panic!("expected a layer");
    };
    assert_eq!(
        session
            .view(ViewKind::Token)
            .unwrap()
            .layer(Slot::Background)
            .unwrap()
            .id(),
        id
    );

    assert_eq!(
        session
            .dispatch(Command::SetPasteTarget(ViewKind::Avatar))
            .unwrap(),
        CommandOutcome::Changed(true)
    );
    assert_eq!(
        session
            .dispatch(Command::SetPasteTarget(ViewKind::Avatar))
            .unwrap(),
        CommandOutcome::Changed(false)
    );
    session
        .dispatch(Command::Paste {
            bytes: png(4, 4, [9, 9, 9, 255]),
        })
        .unwrap();
    let avatar_bg = session
        .view(ViewKind::Avatar)
        .unwrap()
        .layer(Slot::Background)
        .unwrap();
    assert_eq!(avatar_bg.min_scale(), 10.0);
}

#[test]
fn color_copy_and_edit_commands() {
    let mut session = loaded();
    session
        .dispatch(Command::AddColor {
            target: ViewKind::Token,
            color: None,
        })
        .unwrap();
    let token = session.view(ViewKind::Token).unwrap();
    assert_eq!(token.layers()[0].slot(), Slot::Tint);

    let CommandOutcome::Layer(copied) = session
        .dispatch(Command::CopyView {
            from: ViewKind::Avatar,
            to: ViewKind::Token,
        })
        .unwrap()
    else {
        panic!("expected a layer");
    };
    assert_eq!(
        session.view(ViewKind::Token).unwrap().active_layer(),
        Some(copied)
    );
    assert!(
        session
            .dispatch(Command::CopyView {
                from: ViewKind::Token,
                to: ViewKind::Token,
            })
            .is_err()
    );

    assert_eq!(
        session
            .dispatch(Command::Pointer {
                target: ViewKind::Token,
                delta: PointerDelta::drag(1.0, 0.0),
            })
            .unwrap(),
        CommandOutcome::Changed(true)
    );
    assert_eq!(
        session.dispatch(Command::Flip(ViewKind::Token)).unwrap(),
        CommandOutcome::Changed(true)
    );
    assert_eq!(
        session.dispatch(Command::Reset(ViewKind::Token)).unwrap(),
        CommandOutcome::Changed(true)
    );
    assert_eq!(
        session
            .dispatch(Command::Activate {
                target: ViewKind::Token,
                layer: LayerId(9999),
            })
            .unwrap(),
        CommandOutcome::Changed(false)
    );
}

#[test]
fn switched_off_views_reject_edits() {
    let mut session = loaded();
    session
        .dispatch(Command::ToggleModify(ViewKind::Avatar))
        .unwrap();
    assert!(!session.modifies(ViewKind::Avatar));
    let err = session
        .dispatch(Command::Upload {
            target: ViewKind::Avatar,
            bytes: png(4, 4, [1, 2, 3, 255]),
        })
        .unwrap_err();
    assert!(matches!(err, TokenizerError::Validation(_)));

    // Reading from a switched-off view is still allowed.
    session
        .dispatch(Command::CopyView {
            from: ViewKind::Avatar,
            to: ViewKind::Token,
        })
        .unwrap();
}

#[test]
fn export_token_returns_named_blob() {
    let mut session = loaded();
    let CommandOutcome::Exported { file_name, blob } =
        session.dispatch(Command::ExportToken).unwrap()
    else {
        panic!("expected an export");
    };
    assert_eq!(file_name, "Goblin_Boss.Token.png");
    let decoded = image::load_from_memory(&blob.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 32));
}

#[test]
fn finalize_uploads_enabled_views() {
    let mut session = loaded();
    let outcome = session.finalize().unwrap();
    assert!(outcome.avatar_uploaded && outcome.token_uploaded);
    assert_eq!(
        outcome.avatar_path.as_deref(),
        Some("tokenizer/npc_images/Goblin_Boss.Avatar.png")
    );
    let token = session
        .storage()
        .get("tokenizer/npc_images/Goblin_Boss.Token.png")
        .unwrap();
    let decoded = image::load_from_memory(&token.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (32, 32));
    // Token corners are outside the circular mask.
    assert_eq!(decoded.get_pixel(0, 0).0[3], 0);

    let update = session.record_update(&outcome, "5");
    assert_eq!(
        update.prototype_texture.as_deref(),
        Some("tokenizer/npc_images/Goblin_Boss.Token.png?5")
    );
}

#[test]
fn token_only_sessions_keep_the_avatar_path() {
    let cfg = TokenizerConfig {
        token_only_toggle: true,
        ..config()
    };
    let mut session = open(cfg, request());
    session.load_images().unwrap();
    let outcome = session.finalize().unwrap();
    assert!(!outcome.avatar_uploaded);
    assert_eq!(outcome.avatar_path.as_deref(), Some("art/goblin.png"));
    let storage = session.close();
    assert_eq!(storage.paths().count(), 1);
}

#[test]
fn auto_token_uploads_and_updates_record() {
    let mut storage = MemoryStorage::new();
    let mut record = json!({
        "name": "Goblin Boss",
        "img": "art/goblin.png",
        "prototypeToken": { "texture": { "src": "art/goblin-token.png" } }
    });
    let outcome = auto_token(
        config(),
        request(),
        fetcher(),
        &mut storage,
        &Grants::ALL,
        Some(&mut record),
    )
    .unwrap();
    assert!(outcome.token_uploaded && !outcome.avatar_uploaded);
    assert_eq!(storage.paths().count(), 1);

    let src = record["prototypeToken"]["texture"]["src"].as_str().unwrap();
    assert!(src.starts_with("tokenizer/npc_images/Goblin_Boss.Token.png?"));
    assert!(record["img"].as_str().unwrap().starts_with("art/goblin.png?"));
}
