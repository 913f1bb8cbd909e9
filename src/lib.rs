pub mod app;
pub mod camera;
pub mod catalog;
pub mod cli;
pub mod composer;
pub mod config;
pub mod desktop;
pub mod filter;
pub mod mesh;
pub mod render;
pub mod selection;
pub mod service;
pub mod thumbnails;

pub use app::{run, run_with_overrides, App};
