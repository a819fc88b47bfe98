pub mod command_map;
pub mod controller;
pub mod direction;
pub mod error;
pub mod models;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod store;
pub mod transport;
