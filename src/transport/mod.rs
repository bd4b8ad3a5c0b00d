//! Backends that carry keystrokes out and printed text back.
//!
//! - **loopback**: Echo without a host
//! - **stream**: Raw TCP character stream
//! - **pipe**: Local subprocess over stdin/stdout
//! - **pump**: Reader loop shared by stream and pipe

pub mod loopback;
pub mod pipe;
pub mod pump;
pub mod stream;

pub use loopback::LoopbackBackend;
pub use pipe::PipeBackend;
pub use stream::StreamBackend;
