// src/models/mod.rs

pub mod exam;
pub mod pagination;
pub mod question;
pub mod submission;
pub mod user;
