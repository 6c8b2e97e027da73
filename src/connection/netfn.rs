/// The network functions the command engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetFn {
    /// Sensor/Event commands (0x04).
    SensorEvent,
    /// Application commands (0x06).
    App,
    /// Storage commands: SEL, SDR repository, FRU (0x0A).
    Storage,
    /// The OEM group the emulator demonstrates power control on (0x30).
    Oem0,
}

impl NetFn {
    /// Map a raw request netfn to a known network function.
    ///
    /// Response-side (odd) values and anything the engine does not
    /// implement yield `None`.
    pub fn from_request(value: u8) -> Option<Self> {
        match value {
            0x04 => Some(Self::SensorEvent),
            0x06 => Some(Self::App),
            0x0A => Some(Self::Storage),
            0x30 => Some(Self::Oem0),
            _ => None,
        }
    }

    /// The even (request) value of this network function.
    pub fn request_value(&self) -> u8 {
        match self {
            NetFn::SensorEvent => 0x04,
            NetFn::App => 0x06,
            NetFn::Storage => 0x0A,
            NetFn::Oem0 => 0x30,
        }
    }

    /// The odd (response) value of this network function.
    pub fn response_value(&self) -> u8 {
        self.request_value() | 1
    }
}
