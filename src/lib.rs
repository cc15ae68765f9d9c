// src/lib.rs

//! Marketplace listing watcher library

pub mod control;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
