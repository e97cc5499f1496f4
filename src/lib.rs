// Analysis pipeline library - exposes all core modules for testing

pub mod analysis;
pub mod config;
pub mod model;
pub mod project;
pub mod services;
pub mod session;
pub mod settings;
pub mod workspace;
