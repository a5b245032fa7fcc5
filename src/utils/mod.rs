//! Utility modules shared by the tools
//!
//! - `files`: directory listing and output folder management
//! - `images`: image format checks and re-encoding
//! - `http`: HTTP client utilities

pub mod files;
pub mod http;
pub mod images;

#[cfg(test)]
pub(crate) mod test_server;
