pub mod app;
pub mod audio;
pub mod battle;
pub mod config;
pub mod model;
pub mod registry;
pub mod sequencer;
pub mod session;
pub mod ui;
pub mod vote;
