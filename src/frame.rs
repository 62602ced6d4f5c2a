pub mod alloc;
pub mod buffer;
pub mod decode;
pub mod forwarder;
