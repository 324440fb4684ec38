//! Application services layer.

pub mod blog;
pub mod error;
pub mod forms;
pub mod mail;
pub mod pagination;
pub mod repos;
