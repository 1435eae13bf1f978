//! Core data model.

pub mod conversation;
pub mod report;
pub mod work;
