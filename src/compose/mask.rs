use crate::foundation::core::CanvasSize;

/// Clip region applied to masked layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskShape {
    /// The whole canvas; masking is a no-op.
    Rectangle,
    /// The circle inscribed in the canvas, with a one pixel anti-aliased edge.
    Circle,
}

impl MaskShape {
    /// Coverage (0..=255) of pixel `(x, y)` on a canvas of `size`.
    ///
    /// Pixels whose center lies at least half a pixel outside the circle get zero coverage.
    pub fn coverage(self, x: u32, y: u32, size: CanvasSize) -> u8 {
        match self {
            Self::Rectangle => 255,
            Self::Circle => {
                let c = size.center();
                let r = size.as_f64() / 2.0;
                let dx = f64::from(x) + 0.5 - c.x;
                let dy = f64::from(y) + 0.5 - c.y;
                let d = (dx * dx + dy * dy).sqrt();
                let cov = (r + 0.5 - d).clamp(0.0, 1.0);
                (cov * 255.0).round() as u8
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/mask.rs"]
mod tests;
