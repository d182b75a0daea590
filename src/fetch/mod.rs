// src/fetch/mod.rs
//! Offline helpers for the daily archive feed. Nothing here touches the network.

pub mod urls;
