// src/handlers/mod.rs

pub mod qualification;
pub mod quiz;
pub mod stats;
