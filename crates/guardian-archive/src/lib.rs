pub mod archive;
pub mod error;
pub mod store;

pub use archive::*;
pub use error::*;
pub use store::*;
