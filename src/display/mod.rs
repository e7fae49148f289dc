// src/display/mod.rs
//! Display modules for the live session view

pub mod terminal;

pub use terminal::{map_key, spawn_key_reader, KeyAction, TerminalDisplay};
