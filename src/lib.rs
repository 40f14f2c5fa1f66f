pub mod app;
pub mod audio;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod library;
pub mod listener;
pub mod logging;
pub mod model;
pub mod notify;
pub mod session;
pub mod ui;
