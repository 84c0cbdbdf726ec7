//! CLI command implementations.

pub mod build;
pub mod catalog;
pub mod clean;
pub mod doctor;
pub mod flash;
pub mod new;
pub mod regenerate;
pub mod status;
