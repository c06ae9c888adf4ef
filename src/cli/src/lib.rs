//! imgstream CLI - inspect and extract disk images.

pub mod commands;
pub mod output;
