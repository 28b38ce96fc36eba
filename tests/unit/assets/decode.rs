use std::io::Cursor;

use super::*;

fn png_bytes(img: image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_image_png_dimensions_and_premul() {
    let img = image::RgbaImage::from_raw(1, 1, vec![100u8, 50, 200, 128]).unwrap();
    let prepared = decode_image(&png_bytes(img)).unwrap();
    assert_eq!(prepared.width, 1);
    assert_eq!(prepared.height, 1);
    assert_eq!(
        prepared.rgba8_premul.as_slice(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_svg_rasterizes_at_intrinsic_size() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4">
        <rect width="8" height="4" fill="#ff0000"/>
    </svg>"##;
    let prepared = decode_image(svg).unwrap();
    assert_eq!((prepared.width, prepared.height), (8, 4));
    assert_eq!(prepared.pixel(3, 2), Some([255, 0, 0, 255]));
}

#[test]
fn decode_garbage_reports_location() {
    let err = decode_image_at("tokens/bad.png", b"not an image").unwrap_err();
    assert!(err.is_decode());
    assert!(err.to_string().contains("tokens/bad.png"));

    let err = decode_image(br#"<svg"#).unwrap_err();
    assert!(err.is_decode());
}

#[test]
fn solid_and_pixel_access() {
    let img = PreparedImage::solid(2, 3, Color::rgba(255, 0, 0, 128)).unwrap();
    assert_eq!(img.rgba8_premul.len(), 2 * 3 * 4);
    assert_eq!(img.pixel(1, 2), Some([128, 0, 0, 128]));
    assert_eq!(img.pixel(2, 0), None);
    assert!(PreparedImage::from_premul(2, 2, vec![0; 3]).is_err());
}

#[test]
fn clones_share_pixels() {
    let img = PreparedImage::solid(4, 4, Color::WHITE).unwrap();
    let copy = img.clone();
    assert!(std::sync::Arc::ptr_eq(&img.rgba8_premul, &copy.rgba8_premul));
}
