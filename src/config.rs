pub mod model;
pub mod position;
