pub mod app;
pub mod keymap;
