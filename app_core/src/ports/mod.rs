// trait definitions for ports

mod broadcaster;
mod cache;
mod executor;
mod queue;
mod repository;

pub use broadcaster::*;
pub use cache::*;
pub use executor::*;
pub use queue::*;
pub use repository::*;
