// src/core/mod.rs

pub mod catalog;
pub mod events;
pub mod node;
