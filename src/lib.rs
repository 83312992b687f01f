//! # UTIM core
//!
//! Device-side Universal Thing Identity Module: an SRP-6a authenticated
//! session, a layered framing stack (DataLink → Network → Transport → Top),
//! and a state-driven message processor that bridges a locally-attached
//! device and a trusted remote host ("Uhost").

pub mod address;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod datalink;
pub mod error;
pub mod framing;
pub mod logging;
pub mod network;
pub mod processor;
pub mod pump;
pub mod srp;
pub mod tag;
pub mod top;
pub mod transport;
pub mod utim;

pub use config::UtimConfig;
pub use error::UtimError;
pub use utim::Utim;

/// The current version of utim-core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
