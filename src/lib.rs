//! Live video mixing: independently failing sources feed lossy frame forwarders, a render loop
//! composites the freshest frame of each onto every stage, and scene switches animate layers.
#![forbid(unsafe_code)]

pub mod config;
mod foundation;
pub mod frame;
pub mod io;
pub mod layer;
pub mod mixer;
pub mod theatre;

pub use config::model::{Config, ConfigContext};
pub use foundation::core::{Dims, Rgba8, Vec2};
pub use foundation::error::{MixError, MixResult};
pub use frame::alloc::{FrameAllocator, HeapAllocator};
pub use frame::buffer::{Frame, FrameCfg, FrameInfo, FrameType};
pub use frame::forwarder::{ForwarderStats, FrameForwarder, ReadCursor};
pub use layer::animate::Layer;
pub use layer::transform::{LayerTarget, LayerTransform};
pub use mixer::{Controller, Mixer, MixerStats};
pub use theatre::{StartReport, Theatre, TheatreEvent};
