pub mod auth;
pub mod cli;
pub mod commands;
pub mod enrollment;
pub mod output;
pub mod runtime;

pub use faceid_core::errors;
