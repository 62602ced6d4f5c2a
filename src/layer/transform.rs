use crate::foundation::core::Vec2;

/// Where a layer should sit on its stage, in output-relative units.
///
/// `x`/`y` place the top-left corner with `0..1` spanning the output; `scale` is the layer
/// width as a fraction of the output width. The height follows from the source aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub opacity: f64,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self::FULL_SCREEN
    }
}

impl LayerTransform {
    /// Covers the whole output, fully opaque.
    pub const FULL_SCREEN: Self = Self {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
        opacity: 1.0,
    };

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Same placement, invisible.
    pub fn hidden(self) -> Self {
        Self {
            opacity: 0.0,
            ..self
        }
    }
}

/// What a scene assigns to one layer instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTarget {
    pub transform: LayerTransform,
    /// Pose a hidden layer jumps to before animating in.
    pub warp: Option<LayerTransform>,
}

impl From<LayerTransform> for LayerTarget {
    fn from(transform: LayerTransform) -> Self {
        Self {
            transform,
            warp: None,
        }
    }
}
