//! City Traffic Library
//!
//! Ambient vehicle traffic for a city builder, runnable headless or embedded
//! in a host game loop.

pub mod simulation;
