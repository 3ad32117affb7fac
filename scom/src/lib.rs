#![no_std]
//! SCOM: a stop-and-wait handshake protocol between a host ("master") and
//! an embedded device ("slave") over a half-duplex, lossy serial link.

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod protocol;

#[cfg(feature = "std")]
pub mod serial;

mod traits;
pub use traits::*;

#[cfg(feature = "std")]
pub mod fake;

pub mod prelude;
