pub mod error;
pub mod runtime;
pub mod transfer;
pub mod waiter;

pub use error::*;
pub use runtime::*;
pub use transfer::*;
pub use waiter::*;
