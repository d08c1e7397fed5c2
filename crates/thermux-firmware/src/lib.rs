//! ESP32-S3 firmware-specific modules for thermux
//!
//! This crate contains the hardware-specific code that cannot compile on
//! desktop targets: the MCP3561R converter driver, the shift-register
//! selector chain, the SD-card calibration memory, the RTT command console and
//! the board bring-up that wires them into `thermux-core`.

#![no_std]

pub mod console;
pub mod hardware;
pub mod mcp3561;
pub mod publisher;
pub mod sd_memory;
pub mod selector;
