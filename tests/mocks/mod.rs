//! Mock implementations of download components
//!
//! Lets integration tests drive the download pipeline without spawning yt-dlp
//! or touching the network.

pub mod mock_backend;

#[allow(unused_imports)]
pub use mock_backend::ScriptedBackend;
