//! Client module - platform transports and timers
//!
//! reqwest and tokio back the dispatcher on native targets, gloo_net (the
//! browser's fetch API) and gloo_timers back it under WASM.

#[cfg(feature = "no-wasm")]
pub mod request;

#[cfg(feature = "wasm")]
pub mod gloo;
