#![forbid(unsafe_code)]

pub mod achievements;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod time;

pub use error::Error;
pub use time::Clock;
