pub mod assistant;
pub mod classifier;
pub mod config;
pub mod debounce;
pub mod display;
pub mod pipeline;
pub mod sinks;
pub mod trend;

pub use assistant::*;
pub use classifier::*;
pub use config::*;
pub use debounce::*;
pub use display::*;
pub use pipeline::*;
pub use sinks::*;
pub use trend::*;
