//! ipmi-emu: an in-process IPMI BMC emulator.
//!
//! This library emulates the command engine of a Baseboard Management
//! Controller: a registry of managed controllers (in the [`emu`] module),
//! each with a System Event Log, SDR repositories, FRU inventory and sensors
//! (in the [`storage`] and [`emu`] modules), behind a dispatcher that parses
//! IPMI requests and produces wire-exact responses. The [`channel`] module is
//! the thin adapter a session layer uses to feed requests in and get
//! responses back.
//!
//! The emulator is synchronous and single-threaded by design: a request
//! enters [`Emulator::handle_msg`], all state changes happen in that call,
//! and the response is complete when it returns.

pub mod channel;

pub mod connection;

pub mod emu;

pub mod storage;

mod error;
pub use error::EmuError;

pub use emu::{DeviceSupport, Emulator, Mc, McConfig};


/// A source of IPMI wall-clock time, in seconds since the UNIX epoch.
///
/// The SEL and SDR stores read the clock when they stamp records. Supplying
/// a fake implementation via [`Emulator::with_time_source`] lets tests drive
/// "IPMI time" deterministically.
pub trait TimeSource {
    /// The current time in seconds since the UNIX epoch.
    fn now(&self) -> u32;
}

/// [`TimeSource`] backed by the host's system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now(&self) -> u32 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }
}
