//! Posture monitoring application library.
//!
//! The [`monitor`] module owns the real-time sensing pipeline; the binary in
//! `main.rs` is a thin host that wires adapters and consumes results.

pub mod monitor;
