pub mod animate;
pub mod transform;
