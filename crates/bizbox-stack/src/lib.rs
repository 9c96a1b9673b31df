pub mod archive;
pub mod databases;
pub mod error;
pub mod migration;
pub mod orchestrator;

pub use archive::*;
pub use databases::*;
pub use error::*;
pub use migration::*;
pub use orchestrator::*;
