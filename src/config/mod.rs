//! Configuration management for oscan.
//!
//! Provides the XDG settings file that supplies defaults beneath the
//! command-line flags.

mod settings;

pub use settings::{AppSettings, Paths};
