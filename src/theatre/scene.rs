use std::collections::HashMap;

use crate::{
    config::model::SceneCfg,
    foundation::error::{MixError, MixResult},
    layer::transform::LayerTarget,
};

/// A named set of layer targets, reusable on any stage.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    name: String,
    tag: String,
    label: String,
    targets: Vec<Vec<LayerTarget>>,
    order: Vec<(usize, usize)>,
}

impl Scene {
    /// Resolve a configured scene against the theatre's source indices.
    pub fn from_cfg(
        name: &str,
        cfg: &SceneCfg,
        sources: &HashMap<String, usize>,
    ) -> MixResult<Self> {
        let mut targets = vec![Vec::new(); sources.len()];
        let mut order = Vec::with_capacity(cfg.layers.len());
        for (i, layer) in cfg.layers.iter().enumerate() {
            let Some(&src) = sources.get(&layer.source) else {
                return Err(MixError::config(format!(
                    "scene {name} layer {i} refers to non-existent source {}",
                    layer.source
                )));
            };
            let target = layer
                .target()
                .map_err(|e| e.within(format_args!("scene {name} layer {i} is invalid")))?;
            let slots: &mut Vec<LayerTarget> = &mut targets[src];
            order.push((src, slots.len()));
            slots.push(target);
        }
        // Stacking follows source z; repeats of one source keep their listed order.
        order.sort_by_key(|&(src, _)| src);

        Ok(Self {
            name: name.to_owned(),
            tag: cfg.tag.clone(),
            label: cfg.label.clone(),
            targets,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Targets for each appearance of `source`, in config order.
    pub fn targets_for(&self, source: usize) -> &[LayerTarget] {
        self.targets.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(source, occurrence)` pairs from bottom to top.
    pub fn order(&self) -> &[(usize, usize)] {
        &self.order
    }
}
