//! Core library components.
//!
//! Resolution engine, value providers, and the local encrypted secret store.

pub mod cipher;
pub mod constants;
pub mod derived;
pub mod manifest;
pub mod placeholder;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod types;
pub mod validation;
pub mod workspace;
