#![deny(missing_docs)]
//! Wire-level vocabulary shared by the dispatcher and the channel adapter.

mod checksum;
pub use checksum::Checksum;

mod completion_code;
pub use completion_code::CompletionCode;

mod netfn;
pub use netfn::NetFn;

use std::num::NonZeroU8;

use crate::EmuError;

/// A numbered channel.
///
/// The value of a channel is always less than `0xB`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelNumber(NonZeroU8);

impl ChannelNumber {
    /// Create a new `ChannelNumber`.
    ///
    /// This function returns `None` if `value > 0xB`
    pub fn new(value: NonZeroU8) -> Option<Self> {
        if value.get() <= 0xB {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Get the value of this `ChannelNumber`.
    ///
    /// It is guaranteed that values returned by
    /// this function are less than or equal to `0xB`
    pub fn value(&self) -> NonZeroU8 {
        self.0
    }
}

/// The channel on which an IPMI endpoint is reachable.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Channel {
    /// The primary channel.
    Primary,
    /// A numbered channel.
    Numbered(ChannelNumber),
    /// The system channel.
    System,
    /// The current channel, for some definition of current.
    Current,
}

impl Channel {
    /// Create a new `Channel`.
    ///
    /// This function returns `None` for invalid channel values. `value` is
    /// invalid if `value == 0xC || value == 0xD || value > 0xF`.
    pub fn new(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Primary),
            0xE => Some(Self::Current),
            0xF => Some(Self::System),
            v => Some(Self::Numbered(ChannelNumber::new(NonZeroU8::new(v)?)?)),
        }
    }

    /// The number of this channel.
    ///
    /// This value is guaranteed to be less than or
    /// equal to 0xF.
    pub fn value(&self) -> u8 {
        match self {
            Channel::Primary => 0x0,
            Channel::Numbered(v) => v.value().get(),
            Channel::Current => 0xE,
            Channel::System => 0xF,
        }
    }
}

/// The logical unit of an IPMI endpoint or sensor.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum LogicalUnit {
    Zero,
    One,
    Two,
    Three,
}

impl LogicalUnit {
    /// Construct a `LogicalUnit` from the two lowest bits of `value`,
    /// ignoring all other bits.
    pub fn from_low_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::Zero,
            0b01 => Self::One,
            0b10 => Self::Two,
            0b11 => Self::Three,
            _ => unreachable!("Value bitmasked with 0b11 has value greater than 3"),
        }
    }

    /// Get a raw value describing this logical unit.
    ///
    /// This value is always in the range `0..=3`.
    pub fn value(&self) -> u8 {
        match self {
            LogicalUnit::Zero => 0,
            LogicalUnit::One => 1,
            LogicalUnit::Two => 2,
            LogicalUnit::Three => 3,
        }
    }
}

impl TryFrom<u8> for LogicalUnit {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 0b11 {
            Ok(Self::from_low_bits(value))
        } else {
            Err(())
        }
    }
}

impl From<LogicalUnit> for u8 {
    fn from(value: LogicalUnit) -> Self {
        value.value()
    }
}

/// The source or destination address of an IPMI message.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Address {
    /// An endpoint on the IPMB, addressed by its slave address.
    Ipmb {
        /// The 7-bit slave address, stored shifted left by one (always even).
        slave_addr: u8,
        /// The logical unit within the endpoint.
        lun: LogicalUnit,
        /// The channel the endpoint is reachable on.
        channel: Channel,
    },
    /// The system interface of the local BMC.
    SystemInterface {
        /// The logical unit within the BMC.
        lun: LogicalUnit,
        /// The channel the BMC is reachable on.
        channel: Channel,
    },
}

impl Address {
    /// The logical unit the address names.
    pub fn lun(&self) -> LogicalUnit {
        match self {
            Address::Ipmb { lun, .. } => *lun,
            Address::SystemInterface { lun, .. } => *lun,
        }
    }

    /// Replace the logical unit, validating the raw value.
    pub fn set_lun(&mut self, value: u8) -> Result<(), EmuError> {
        let value =
            LogicalUnit::try_from(value).map_err(|_| EmuError::InvalidArgument("lun"))?;

        match self {
            Address::Ipmb { lun, .. } => *lun = value,
            Address::SystemInterface { lun, .. } => *lun = value,
        }

        Ok(())
    }

    /// The slave address, or 0 when the address has none.
    pub fn slave_addr(&self) -> u8 {
        match self {
            Address::Ipmb { slave_addr, .. } => *slave_addr,
            Address::SystemInterface { .. } => 0,
        }
    }
}

/// The wire representation of an IPMI message.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    netfn: u8,
    cmd: u8,
    data: Vec<u8>,
}

impl Message {
    /// Create a new request message with the provided `netfn`, `cmd` and `data`.
    pub fn new_request(netfn: NetFn, cmd: u8, data: Vec<u8>) -> Self {
        Self {
            netfn: netfn.request_value(),
            cmd,
            data,
        }
    }

    /// Create a new message with the provided raw `netfn`, `cmd` and `data`.
    pub fn new_raw(netfn: u8, cmd: u8, data: Vec<u8>) -> Self {
        Self { netfn, cmd, data }
    }

    /// Get the raw netfn value for the message.
    pub fn netfn_raw(&self) -> u8 {
        self.netfn
    }

    /// Get the command value for this message.
    pub fn cmd(&self) -> u8 {
        self.cmd
    }

    /// Get a reference to the data for this message.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the data for this message.
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

/// Default response capacity handed to the dispatcher, ample for every
/// command the engine implements.
pub const DEFAULT_RESPONSE_LIMIT: usize = 1000;

/// The response area a caller hands to the dispatcher.
///
/// Byte 0 of the finished buffer is the completion code; any further bytes
/// are the response body. `limit` is the caller's capacity: commands whose
/// reply would not fit (`Get SDR`, `Read FRU Data`) fail with
/// [`CompletionCode::RequestedDataLengthExceeded`] instead of truncating.
#[derive(Clone, Debug)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    limit: usize,
}

impl ResponseBuffer {
    /// Create a response buffer that can hold up to `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// The completion code, or [`CompletionCode::Unspecified`] if no
    /// response has been produced yet.
    pub fn completion_code(&self) -> u8 {
        self.data
            .first()
            .copied()
            .unwrap_or(CompletionCode::Unspecified.value())
    }

    /// The full response, completion code first.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The response body following the completion code.
    pub fn body(&self) -> &[u8] {
        if self.data.is_empty() {
            &[]
        } else {
            &self.data[1..]
        }
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// Replace the response with a single completion code.
    pub(crate) fn fail(&mut self, code: CompletionCode) {
        self.data.clear();
        self.data.push(code.value());
    }

    /// Replace the response with `bytes`.
    pub(crate) fn set(&mut self, bytes: Vec<u8>) {
        self.data = bytes;
    }

    /// Take the response out, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_LIMIT)
    }
}
