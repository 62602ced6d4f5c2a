use crate::{
    foundation::core::{Dims, Vec2},
    layer::transform::{LayerTarget, LayerTransform},
};

/// Opacity below which a layer is treated as gone.
pub const VISIBLE_EPSILON: f64 = 1.0 / 512.0;

/// Exponential approach of `x` toward `target` over `dt` seconds.
///
/// An infinite `speed` lands on the target in one tick. A non-positive `dt` leaves `x` alone.
pub fn ramp(x: f64, target: f64, dt: f64, speed: f64) -> f64 {
    let k = ramp_factor(dt, speed);
    if k <= 0.0 {
        return x;
    }
    if k >= 1.0 {
        return target;
    }
    // Measured from the target so rounding can never carry `x` past it.
    let next = target - (target - x) * (1.0 - k);
    if x <= target {
        next.clamp(x, target)
    } else {
        next.clamp(target, x)
    }
}

fn ramp_factor(dt: f64, speed: f64) -> f64 {
    if dt.is_nan() || dt <= 0.0 {
        return 0.0;
    }
    let k = 1.0 - (-speed * dt).exp();
    if k.is_nan() { 1.0 } else { k.clamp(0.0, 1.0) }
}

/// Aspect correction applied to a layer's vertical size: output aspect over source aspect.
///
/// Falls back to `1` while either size is unknown.
pub fn squeeze(output: Dims, source: Dims) -> f64 {
    let s = output.aspect() / source.aspect();
    if s.is_finite() && s > 0.0 { s } else { 1.0 }
}

/// One source's animated appearance on one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    source: usize,
    pub position: Vec2,
    pub size: Vec2,
    pub opacity: f64,
    pub squeeze: f64,
    output: Dims,
    target: Option<LayerTransform>,
}

impl Layer {
    pub fn new(source: usize, output: Dims, source_dims: Dims) -> Self {
        Self {
            source,
            position: Vec2::new(0.5, 0.5),
            size: Vec2::new(1.0, 1.0),
            opacity: 0.0,
            squeeze: squeeze(output, source_dims),
            output,
            target: None,
        }
    }

    /// Index of the source this layer shows.
    pub fn source(&self) -> usize {
        self.source
    }

    pub fn output(&self) -> Dims {
        self.output
    }

    pub fn target(&self) -> Option<&LayerTransform> {
        self.target.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > VISIBLE_EPSILON
    }

    /// Set the pose this layer animates toward.
    ///
    /// The first assignment lands immediately. `None` keeps the last placement and fades out.
    pub fn apply_state(&mut self, target: Option<LayerTarget>) {
        let next = match target {
            Some(t) => {
                if let (Some(warp), Some(_)) = (t.warp, self.target)
                    && !self.is_visible()
                {
                    self.jump_to(&warp);
                }
                t.transform
            }
            None => self
                .target
                .unwrap_or(LayerTransform {
                    x: 0.0,
                    y: 0.0,
                    scale: 0.0,
                    opacity: 0.0,
                })
                .hidden(),
        };

        if self.target.is_none() {
            self.jump_to(&next);
        }
        self.target = Some(next);
    }

    /// Land on the current target without animating.
    pub fn snap(&mut self) {
        if let Some(t) = self.target {
            self.jump_to(&t);
        }
    }

    fn jump_to(&mut self, t: &LayerTransform) {
        self.position = t.position();
        self.size = Vec2::new(t.scale, t.scale * self.squeeze);
        self.opacity = t.opacity;
    }

    /// Advance every animated field toward the target by `dt` seconds.
    pub fn animate(&mut self, dt: f64, speed: f64, source_dims: Dims) {
        self.squeeze = squeeze(self.output, source_dims);
        let Some(t) = self.target else {
            return;
        };
        self.position.x = ramp(self.position.x, t.x, dt, speed);
        self.position.y = ramp(self.position.y, t.y, dt, speed);
        self.size.x = ramp(self.size.x, t.scale, dt, speed);
        self.size.y = ramp(self.size.y, t.scale * self.squeeze, dt, speed);
        self.opacity = ramp(self.opacity, t.opacity, dt, speed);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/animate.rs"]
mod tests;
