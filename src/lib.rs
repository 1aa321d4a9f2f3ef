//! # lora-sensor-node
//!
//! A portable, no_std core for battery powered LoRa telemetry nodes built from
//! a few temperature probes, one status input and a radio, reporting a few
//! times an hour and sleeping the rest of the time.
//!
//! This crate implements the node's duty cycle using:
//! - `embedded-hal` traits for digital inputs and delays
//! - CRC-16/XMODEM framed binary telemetry, or a text rendering for gateways
//!   that do not parse binary
//! - a watchdog-driven power-down sleep with a low-voltage failsafe
//! - an interrupt-safe tick counter built on `critical-section`
//!
//! ## Crate features
//! | Feature     | Description |
//! |-------------|-------------|
//! | `std`       | Disables `#![no_std]` and enables the thread-backed [`sleep::hosted`] model |
//! | `defmt-0-3` | Uses `defmt` logging |
//! | `log`       | Uses `log` logging |
//!
//! ## Software Features
//!
//! - **Fixed length frames**: node id, device id, one `(integer, hundredths)`
//!   pair per channel and a status byte, whatever the sensors did
//! - **Two gateway profiles**: binary with CRC trailer and optional echo
//!   check, or JSON-like text
//! - **Provisioned identity** read from NVM, written with a default on first boot
//! - **Sleep counted in watchdog ticks**, with a forced halt when the supply
//!   is too low to run safely
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lora_sensor_node::config::NodeConfig;
//! use lora_sensor_node::identity::{self, DeviceId};
//! use lora_sensor_node::node::{Board, SensorNode};
//!
//! lora_sensor_node::declare_watchdog_ticks!();
//!
//! let device_id = identity::load_or_provision(&mut eeprom, &DeviceId::DEFAULT)?;
//! let board = Board { bus, aux, radio, delay, power, supply, ticks: &WATCHDOG_TICKS };
//! let mut node = SensorNode::new(NodeConfig::binary_gateway(), device_id, board)?;
//! node.start()?;
//! loop {
//!     let _ = node.run_cycle();
//! }
//! ```
//!
//! And in the watchdog interrupt handler:
//!
//! ```rust,ignore
//! lora_sensor_node::watchdog_tick!();
//! ```
//!
//! The encoder can also be used on its own:
//!
//! ```rust
//! use lora_sensor_node::frame;
//! use lora_sensor_node::identity::DeviceId;
//!
//! let wire = frame::encode(b"<1234>", DeviceId::DEFAULT, &[Some(23.47), None], 1).unwrap();
//! assert_eq!(wire.payload().len(), 17);
//! assert!(wire.verify());
//! ```
//!
//! ## Integration Notes
//!
//! - One watchdog tick lasts 8 s; sleep requests are rounded to whole ticks
//! - Only one [`sleep::SleepController`] may share a tick counter
//! - The text profile transmits no checksum
//!
//! --
//! Designed for `#![no_std]` use on 8-bit MCUs with a few kB of RAM.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub use critical_section;
pub use heapless;

pub mod config;
pub mod consts;
pub mod crc;
pub mod frame;
pub mod identity;
pub mod link;
pub mod node;
pub mod sensors;
pub mod sleep;
pub mod supply;
pub mod text;
