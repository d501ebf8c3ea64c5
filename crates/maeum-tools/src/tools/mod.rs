//! Builtin tool implementations

pub mod analyze;
pub mod ask;
pub mod bash;
pub mod edit;
pub mod git;
pub mod glob;
pub mod grep;
pub mod index;
pub mod list_dir;
pub mod memory;
pub mod multi_edit;
pub mod read;
pub mod search;
pub mod structure;
pub mod symbols;
pub mod web;
pub mod write;
