//! Stack machine that runs modules recorded by the pixel compiler.

pub mod host;
pub mod machine;
pub mod trap;

pub use host::{Host, StdoutHost};
pub use machine::{Machine, MachineConfig, TraceEntry, Value};
pub use trap::Trap;
