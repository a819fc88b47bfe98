//! Bluetooth remote control for serial-driven RC cars.
//!
//! - [`domain`] - the controller, its session loop and the collaborator traits
//! - [`infrastructure`] - BLE transport, key store and logging
//! - [`presentation`] - terminal front end

pub mod domain;
pub mod infrastructure;
pub mod presentation;
