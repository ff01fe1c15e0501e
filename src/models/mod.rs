// src/models/mod.rs

pub mod application;
pub mod opportunity;
pub mod quiz;
pub mod user;
