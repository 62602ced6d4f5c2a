use std::time::Duration;

use crate::{
    foundation::core::Dims,
    io::Sink,
    layer::animate::Layer,
    theatre::scene::Scene,
};

/// Animation speed that settles a transition within `transition`, as a ramp rate.
pub fn speed_for(transition: Duration) -> f64 {
    let secs = transition.as_secs_f64();
    if secs > 0.0 { 7.0 / secs } else { f64::INFINITY }
}

/// One output: its sink, every layer it could ever show, and which of them are active.
#[derive(Debug)]
pub struct Stage {
    name: String,
    layers: Vec<Layer>,
    by_source: Vec<Vec<usize>>,
    scene_orders: Vec<Vec<usize>>,
    active_scene: Option<usize>,
    speed: f64,
    default_scene: String,
    sink: Box<dyn Sink>,
}

impl Stage {
    /// Pre-build enough layer instances per source for the busiest scene.
    pub fn new(
        name: &str,
        default_scene: &str,
        transition: Duration,
        sink: Box<dyn Sink>,
        source_dims: &[Dims],
        scenes: &[Scene],
    ) -> Self {
        let output = sink.frames().info().dims();

        let mut layers = Vec::new();
        let mut by_source = Vec::with_capacity(source_dims.len());
        for (src, dims) in source_dims.iter().enumerate() {
            let count = scenes
                .iter()
                .map(|s| s.targets_for(src).len())
                .max()
                .unwrap_or(0);
            let first = layers.len();
            layers.extend((0..count).map(|_| Layer::new(src, output, *dims)));
            by_source.push((first..layers.len()).collect::<Vec<_>>());
        }

        let scene_orders = scenes
            .iter()
            .map(|scene| Self::render_order(&by_source, scene))
            .collect();

        Self {
            name: name.to_owned(),
            layers,
            by_source,
            scene_orders,
            active_scene: None,
            speed: speed_for(transition),
            default_scene: default_scene.to_owned(),
            sink,
        }
    }

    /// Layers the scene leaves untargeted go first so they fade out underneath.
    fn render_order(by_source: &[Vec<usize>], scene: &Scene) -> Vec<usize> {
        let mut order = Vec::new();
        for (src, instances) in by_source.iter().enumerate() {
            let used = scene.targets_for(src).len();
            order.extend(instances.iter().skip(used).copied());
        }
        order.extend(
            scene
                .order()
                .iter()
                .filter_map(|&(src, occ)| by_source.get(src)?.get(occ).copied()),
        );
        order
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_scene(&self) -> &str {
        &self.default_scene
    }

    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    pub fn output(&self) -> Dims {
        self.sink.frames().info().dims()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, transition: Duration) {
        self.speed = speed_for(transition);
    }

    /// Every layer instance, grouped by source.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Indices into [`Self::layers`] of the instances that belong to `source`.
    pub fn instances(&self, source: usize) -> &[usize] {
        self.by_source.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_scene(&self) -> Option<usize> {
        self.active_scene
    }

    /// Layers of the active scene from bottom to top.
    pub fn active_layers(&self) -> impl Iterator<Item = &Layer> {
        self.active_scene
            .and_then(|i| self.scene_orders.get(i))
            .into_iter()
            .flatten()
            .map(|&i| &self.layers[i])
    }

    pub(crate) fn apply_scene(&mut self, index: usize, scene: &Scene, animate: bool) {
        for (src, instances) in self.by_source.iter().enumerate() {
            let targets = scene.targets_for(src);
            for (k, &layer) in instances.iter().enumerate() {
                let layer = &mut self.layers[layer];
                layer.apply_state(targets.get(k).copied());
                if !animate {
                    layer.snap();
                }
            }
        }
        self.active_scene = Some(index);
    }

    pub fn animate(&mut self, dt: f64, source_dims: &[Dims]) {
        for layer in &mut self.layers {
            let dims = source_dims.get(layer.source()).copied().unwrap_or_default();
            layer.animate(dt, self.speed, dims);
        }
    }
}
