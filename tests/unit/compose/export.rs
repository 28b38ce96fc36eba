use crate::foundation::core::CanvasSize;

use super::*;

fn half_red_surface() -> Surface {
    let mut s = Surface::new(CanvasSize::new(4).unwrap());
    for px in s.data.chunks_exact_mut(8) {
        px[..4].copy_from_slice(&[255, 0, 0, 255]);
    }
    s
}

#[test]
fn codec_metadata() {
    assert_eq!(ImageCodec::Webp.extension(), "webp");
    assert_eq!(ImageCodec::Jpg.mime(), "image/jpeg");
    assert_eq!("JPEG".parse::<ImageCodec>().unwrap(), ImageCodec::Jpg);
    assert!("tiff".parse::<ImageCodec>().is_err());
    let c: ImageCodec = serde_json::from_str("\"jpeg\"").unwrap();
    assert_eq!(c, ImageCodec::Jpg);
}

#[test]
fn png_roundtrip_preserves_pixels() {
    let s = half_red_surface();
    let enc = encode_surface(&s, ImageCodec::Png).unwrap();
    assert_eq!(enc.mime, "image/png");
    let decoded = image::load_from_memory(&enc.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(decoded.get_pixel(1, 0).0[3], 0);
}

#[test]
fn webp_is_lossless() {
    let s = half_red_surface();
    let enc = encode_surface(&s, ImageCodec::Webp).unwrap();
    assert_eq!(image::guess_format(&enc.bytes).unwrap(), image::ImageFormat::WebP);
    let decoded = image::load_from_memory(&enc.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
}

#[test]
fn jpeg_flattens_transparency_onto_white() {
    let s = Surface::new(CanvasSize::new(8).unwrap());
    let enc = encode_surface(&s, ImageCodec::Jpg).unwrap();
    let decoded = image::load_from_memory(&enc.bytes).unwrap().to_rgb8();
    assert!(decoded.get_pixel(4, 4).0.iter().all(|c| *c > 245));
}
