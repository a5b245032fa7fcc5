pub mod config;
pub mod error;
pub mod tools;
pub mod utils;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
