//! CLI command implementations.

pub mod encrypt;
pub mod probe;
pub mod profile;
pub mod status;
pub mod track;
