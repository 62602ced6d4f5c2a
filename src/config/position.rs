//! Scene layer placement, including edge- and centre-based positioning.
//!
//! Edges are fractions of the output measured inward from that side. A negative horizontal
//! edge is given in units of the output height instead and converted assuming a 16:9 output,
//! so `"left": -0.1` leaves the same gap as `"top": 0.1`.

use crate::{
    foundation::error::{MixError, MixResult},
    layer::transform::{LayerTarget, LayerTransform},
};

const HEIGHT_TO_WIDTH: f64 = 9.0 / 16.0;

/// One layer of a scene as written in the config file.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerCfg {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp: Option<LayerTransform>,
}

fn normalize(edge: Option<f64>, aspect: f64) -> Option<f64> {
    edge.map(|v| if v >= 0.0 { v } else { -v * aspect })
}

impl LayerCfg {
    pub fn full_screen(source: &str) -> Self {
        Self {
            source: source.to_owned(),
            x: Some(0.0),
            y: Some(0.0),
            scale: Some(1.0),
            opacity: Some(1.0),
            ..Self::default()
        }
    }

    /// Reduce every positioning style to a plain transform.
    pub fn resolve(&self) -> MixResult<LayerTransform> {
        if self.x.is_some() && (self.left.is_some() || self.right.is_some()) {
            return Err(MixError::config(
                "cannot set both x and left or right for the position",
            ));
        }
        if self.y.is_some() && (self.top.is_some() || self.bottom.is_some()) {
            return Err(MixError::config(
                "cannot set both y and top or bottom for the position",
            ));
        }
        if [self.top, self.bottom, self.left, self.right]
            .iter()
            .all(Option::is_some)
        {
            return Err(MixError::config("cannot define all four edges for position"));
        }

        let left = normalize(self.left, HEIGHT_TO_WIDTH);
        let right = normalize(self.right, HEIGHT_TO_WIDTH);
        let top = normalize(self.top, 1.0);
        let bottom = normalize(self.bottom, 1.0);

        let mut scale = self.scale.or(match (left, right, top, bottom) {
            (Some(l), Some(r), _, _) => Some(1.0 - l - r),
            (_, _, Some(t), Some(b)) => Some(1.0 - t - b),
            _ => None,
        });

        let mut x = self.x;
        if let Some(cx) = self.cx {
            let s = match (scale, left, right) {
                (Some(s), _, _) => s,
                (None, Some(l), _) => (cx - l) * 2.0,
                (None, None, Some(r)) => ((1.0 - cx) - r) * 2.0,
                (None, None, None) => {
                    return Err(MixError::config("horizontal scale underconstrained"));
                }
            };
            scale = Some(s);
            x = Some(cx - s / 2.0);
        }
        let mut y = self.y;
        if let Some(cy) = self.cy {
            let s = match (scale, top, bottom) {
                (Some(s), _, _) => s,
                (None, Some(t), _) => (cy - t) * 2.0,
                (None, None, Some(b)) => ((1.0 - cy) - b) * 2.0,
                (None, None, None) => {
                    return Err(MixError::config("vertical scale underconstrained"));
                }
            };
            scale = Some(s);
            y = Some(cy - s / 2.0);
        }

        let scale = scale.unwrap_or(1.0);
        let x = x
            .or(left)
            .or(right.map(|r| (1.0 - r) - scale))
            .unwrap_or(0.0);
        let y = y
            .or(top)
            .or(bottom.map(|b| (1.0 - b) - scale))
            .unwrap_or(0.0);
        let opacity = self.opacity.unwrap_or(1.0);

        if !(scale.is_finite() && scale > 0.0) {
            return Err(MixError::config(format!("scale must be positive, got {scale}")));
        }
        if !(0.0..=1.0).contains(&opacity) {
            return Err(MixError::config(format!(
                "opacity must be within 0..1, got {opacity}"
            )));
        }
        if !(x.is_finite() && y.is_finite()) {
            return Err(MixError::config("position must be finite"));
        }

        Ok(LayerTransform {
            x,
            y,
            scale,
            opacity,
        })
    }

    /// Resolved transform plus the optional warp-in pose.
    pub fn target(&self) -> MixResult<LayerTarget> {
        Ok(LayerTarget {
            transform: self.resolve()?,
            warp: self.warp,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/position.rs"]
mod tests;
