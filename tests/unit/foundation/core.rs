use super::*;

#[test]
fn canvas_size_validates_bounds() {
    assert!(CanvasSize::new(0).is_err());
    assert!(CanvasSize::new(CanvasSize::MAX + 1).is_err());
    let s = CanvasSize::new(400).unwrap();
    assert_eq!(s.px(), 400);
    assert_eq!(s.center(), Point::new(200.0, 200.0));
}

#[test]
fn premultiply_rounds_and_keeps_alpha() {
    let c = Rgba8Premul::from_straight_rgba(255, 128, 0, 128);
    assert_eq!(c.to_array(), [128, 64, 0, 128]);
    assert_eq!(Rgba8Premul::transparent().to_array(), [0, 0, 0, 0]);
}
