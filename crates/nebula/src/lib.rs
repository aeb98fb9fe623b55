//! An out-of-the-box Nebula session that assembles the engines, the
//! selector and the conversation manager.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring Nebula into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
mod session;

pub use config::{Config, ConfigError};
pub use nebula_local_engine::LoadProgress;
pub use session::{Session, SessionBuilder};

/// Re-exports of [`nebula_core`] crate.
pub mod core {
    pub use nebula_core::*;
}

/// Re-exports of [`nebula_model`] crate.
pub mod model {
    pub use nebula_model::*;
}
