pub mod discovery;
pub mod env;
pub mod error;
pub mod handle;
pub mod ini;
pub mod patch;

pub use discovery::*;
pub use env::*;
pub use error::*;
pub use handle::*;
pub use ini::*;
pub use patch::*;
