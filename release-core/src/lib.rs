#![no_std]

// Shared logic for the key release controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.

pub mod actuator;
pub mod config;
pub mod duration;
pub mod feedback;
pub mod protocol;
pub mod service;
pub mod session;
pub mod sleep;
pub mod telemetry;
pub mod time;
