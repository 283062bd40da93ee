pub mod config;
pub mod error;
pub mod extract;
pub mod io;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod registry;
pub mod sync;
pub mod tabulate;

pub use error::{Result, TimetableError};
