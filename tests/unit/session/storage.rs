use super::*;
use crate::compose::export::ImageCodec;

fn blob(bytes: &[u8]) -> EncodedImage {
    EncodedImage {
        codec: ImageCodec::Png,
        mime: "image/png",
        bytes: bytes.to_vec(),
    }
}

#[test]
fn parse_bracketed_paths() {
    let p = StoragePath::parse("[data] tokenizer/pc_images/").unwrap();
    assert_eq!(p.source, "data");
    assert_eq!(p.bucket, None);
    assert_eq!(p.current, "tokenizer/pc_images");
    assert_eq!(p.to_string(), "[data] tokenizer/pc_images");

    let p = StoragePath::parse("[s3:my-bucket] art").unwrap();
    assert_eq!(p.source, "s3");
    assert_eq!(p.bucket.as_deref(), Some("my-bucket"));
    assert_eq!(p.to_string(), "[s3:my-bucket] art");
}

#[test]
fn parse_bare_and_invalid_paths() {
    let p = StoragePath::parse("/tokens/npc").unwrap();
    assert_eq!(p.source, DEFAULT_SOURCE);
    assert_eq!(p.current, "tokens/npc");

    assert!(StoragePath::parse("[data tokens").is_err());
    assert!(StoragePath::parse("[] tokens").is_err());
    assert_eq!(StoragePath::parse("[data]").unwrap().current, "");
}

#[test]
fn join_handles_empty_root() {
    assert_eq!(StoragePath::parse("[data]").unwrap().join("a.png"), "a.png");
    assert_eq!(StoragePath::parse("x/y").unwrap().join("a.png"), "x/y/a.png");
}

#[test]
fn memory_storage_uploads_and_browses() {
    let dir = StoragePath::parse("[data] tokens").unwrap();
    let mut storage = MemoryStorage::new().with_file("tokens/G.Token-001.webp", blob(b"1"));
    let path = storage.upload(&blob(b"2"), &dir, "G.Token-002.webp").unwrap();
    assert_eq!(path, "tokens/G.Token-002.webp");
    storage.upload(&blob(b"3"), &dir, "Other.png").unwrap();

    let found = storage
        .browse(&dir.with_current("tokens/G.Token-*.webp"))
        .unwrap();
    assert_eq!(found, vec!["tokens/G.Token-001.webp", "tokens/G.Token-002.webp"]);
    assert_eq!(storage.get("tokens/Other.png").unwrap().bytes, b"3");

    assert!(storage.upload(&blob(b"4"), &dir, "a/b.png").is_err());
}

#[test]
fn fs_storage_round_trip() {
    let root = std::path::PathBuf::from("target").join("unit_fs_storage");
    let _ = std::fs::remove_dir_all(&root);
    let mut storage = FsStorage::new(&root);
    let dir = StoragePath::parse("[data] out/tokens").unwrap();

    let path = storage.upload(&blob(b"png"), &dir, "G.Token-001.png").unwrap();
    assert_eq!(path, "out/tokens/G.Token-001.png");
    assert_eq!(std::fs::read(root.join(&path)).unwrap(), b"png");

    let found = storage.browse(&dir.with_current("out/tokens/G.Token-*.png")).unwrap();
    assert_eq!(found, vec!["out/tokens/G.Token-001.png"]);
    assert!(
        storage
            .browse(&dir.with_current("missing/*.png"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn grants_report_rights() {
    assert!(Grants::ALL.can_upload() && Grants::ALL.can_browse());
    assert!(!Grants::NONE.can_upload());
}
