pub mod carousel;
pub mod channel;
pub mod config;
pub mod controls;
pub mod error;
pub mod indicator;
pub mod player;
pub mod protocol;
pub mod types;

pub use config::{MediaManifest, parse_manifest};
pub use error::{Error, Result};
pub use protocol::{SyncMessage, SyncSnapshot};
pub use types::*;
