use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    config::position::LayerCfg,
    foundation::{
        core::Rgba8,
        error::{MixError, MixResult},
    },
    frame::buffer::FrameCfg,
};

/// Top-level engine configuration, read from JSON.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub sources: BTreeMap<String, SourceCfg>, // stable keys
    #[serde(default)]
    pub scenes: BTreeMap<String, SceneCfg>,
    pub stages: BTreeMap<String, StageCfg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_colour: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SourceCfg {
    #[serde(default)]
    pub z: f64,
    /// Generate a full-screen scene named after this source.
    #[serde(default)]
    pub make_scene: bool,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub label: String,
    /// Source drawn in this one's place while it is not live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Raw YUYV422 frames read from a shell command's stdout.
    FfmpegStdout { frames: FrameCfg, cmd: String },
    /// A still picture from `path`, or a blank canvas of `colour` when no path is given.
    Image {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
        #[serde(default)]
        colour: Option<String>,
    },
}

impl SourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FfmpegStdout { .. } => "ffmpeg_stdout",
            Self::Image { .. } => "image",
        }
    }

    fn validate(&self) -> MixResult<()> {
        match self {
            Self::FfmpegStdout { frames, cmd } => {
                frames.validate()?;
                if frames.width % 2 != 0 {
                    return Err(MixError::config(format!(
                        "YUYV422 frames need an even width, got {}",
                        frames.width
                    )));
                }
                if cmd.trim().is_empty() {
                    return Err(MixError::config("cmd must not be empty"));
                }
            }
            Self::Image {
                path,
                width,
                height,
                colour,
            } => {
                if width.is_some() != height.is_some() {
                    return Err(MixError::config("width and height must be given together"));
                }
                if width == &Some(0) || height == &Some(0) {
                    return Err(MixError::config("width and height must be at least 1"));
                }
                if path.is_none() && width.is_none() {
                    return Err(MixError::config(
                        "an image source needs a path or a width and height",
                    ));
                }
                if let Some(c) = colour {
                    Rgba8::parse_hex(c)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SceneCfg {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub layers: Vec<LayerCfg>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StageCfg {
    pub default_scene: String,
    #[serde(default)]
    pub transition_time_ms: Option<u64>,
    pub frames: FrameCfg,
    #[serde(flatten)]
    pub kind: SinkKind,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkKind {
    /// Composited RGBA frames piped into a shell command's stdin.
    FfmpegStdin { cmd: String },
    /// Output is discarded.
    Null,
}

impl SinkKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FfmpegStdin { .. } => "ffmpeg_stdin",
            Self::Null => "null",
        }
    }
}

impl StageCfg {
    pub fn validate(&self) -> MixResult<()> {
        if self.transition_time_ms.is_none() {
            return Err(MixError::config("transition_time_ms must be set"));
        }
        self.frames.validate()?;
        if let SinkKind::FfmpegStdin { cmd } = &self.kind
            && cmd.trim().is_empty()
        {
            return Err(MixError::config("cmd must not be empty"));
        }
        Ok(())
    }

    pub fn transition_secs(&self) -> f64 {
        self.transition_time_ms.unwrap_or(0) as f64 / 1000.0
    }
}

impl Config {
    pub fn from_json_str(s: &str) -> MixResult<Self> {
        serde_json::from_str(s).map_err(|e| MixError::config(format!("parse config JSON: {e}")))
    }

    /// Parse, add generated scenes and validate.
    pub fn parse(s: &str) -> MixResult<Self> {
        let mut cfg = Self::from_json_str(s)?;
        cfg.add_generated_scenes();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> MixResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse(&text)
    }

    /// Add a full-screen scene for every `make_scene` source that has none of its own.
    pub fn add_generated_scenes(&mut self) {
        for (name, src) in &self.sources {
            if !src.make_scene || self.scenes.contains_key(name) {
                continue;
            }
            self.scenes.insert(
                name.clone(),
                SceneCfg {
                    tag: src.tag.clone(),
                    label: src.label.clone(),
                    layers: vec![LayerCfg::full_screen(name)],
                },
            );
        }
    }

    pub fn validate(&self) -> MixResult<()> {
        if self.sources.is_empty() {
            return Err(MixError::config("at least one source should be defined"));
        }
        if self.stages.is_empty() {
            return Err(MixError::config("at least one stage should be defined"));
        }
        for (name, src) in &self.sources {
            if !src.z.is_finite() {
                return Err(MixError::config(format!("source {name} has a non-finite z")));
            }
            src.kind
                .validate()
                .map_err(|e| e.within(format_args!("source {name} is invalid")))?;
            if let Some(fb) = &src.fallback
                && (fb == name || !self.sources.contains_key(fb))
            {
                return Err(MixError::config(format!(
                    "{fb} cannot be used as fallback source for {name}"
                )));
            }
        }
        for (name, stage) in &self.stages {
            stage
                .validate()
                .map_err(|e| e.within(format_args!("stage {name} is invalid")))?;
            if !self.scenes.contains_key(&stage.default_scene) {
                return Err(MixError::config(format!(
                    "scene {}, which is {name}'s default scene, does not exist",
                    stage.default_scene
                )));
            }
        }
        for (name, scene) in &self.scenes {
            for (i, layer) in scene.layers.iter().enumerate() {
                if !self.sources.contains_key(&layer.source) {
                    return Err(MixError::config(format!(
                        "scene {name} layer {i} refers to non-existent source {}",
                        layer.source
                    )));
                }
                layer
                    .resolve()
                    .map_err(|e| e.within(format_args!("scene {name} layer {i} is invalid")))?;
            }
        }
        match &self.fallback_colour {
            None => return Err(MixError::config("please set fallback_colour in the config")),
            Some(c) => {
                Rgba8::parse_hex(c)?;
            }
        }
        Ok(())
    }

    pub fn fallback(&self) -> Rgba8 {
        self.fallback_colour
            .as_deref()
            .and_then(|c| Rgba8::parse_hex(c).ok())
            .unwrap_or(Rgba8::BLACK)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sources:")?;
        for (name, src) in &self.sources {
            writeln!(f, "  {name} ({})", src.kind.type_name())?;
        }
        writeln!(f, "\nStages:")?;
        for (name, stage) in &self.stages {
            writeln!(f, "  {name} ({})", stage.kind.type_name())?;
        }
        writeln!(f, "\nScenes:")?;
        for name in self.scenes.keys() {
            writeln!(f, "  {name}")?;
        }
        Ok(())
    }
}

/// Resolves the relative paths found in a config file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigContext {
    pub base_dir: PathBuf,
}

impl ConfigContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Context for a config loaded from `path`: relative paths are taken from its directory.
    pub fn for_file(path: &Path) -> Self {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::new(dir)
    }

    pub fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/model.rs"]
mod tests;
