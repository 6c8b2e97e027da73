/// Completion codes the command engine produces.
///
/// Client libraries branch on the exact byte, so every handler maps its
/// failure to one specific code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    /// The command completed normally.
    Completed,
    /// Command-specific: a partial SDR add over- or under-ran the declared
    /// record length.
    RecordLengthInvalid,
    /// The target of an encapsulated IPMB frame does not exist.
    NakOnWrite,
    /// The netfn/command pair is not supported by the addressed MC.
    InvalidCommand,
    /// The store has no room for the new record.
    OutOfSpace,
    /// A nonzero reservation token did not match the current one.
    InvalidReservation,
    /// The request carried fewer bytes than the command requires.
    RequestDataLengthInvalid,
    /// The response would not fit the caller's buffer.
    RequestedDataLengthExceeded,
    /// An offset points beyond the addressed record or area.
    ParameterOutOfRange,
    /// No record with the requested id exists.
    NotPresent,
    /// A request field is malformed.
    InvalidDataField,
    /// The command is valid but not in the repository's current mode.
    NotSupportedInPresentState,
    /// Unspecified failure.
    Unspecified,
}

impl CompletionCode {
    /// The wire value of this completion code.
    pub fn value(&self) -> u8 {
        match self {
            CompletionCode::Completed => 0x00,
            CompletionCode::RecordLengthInvalid => 0x80,
            CompletionCode::NakOnWrite => 0x83,
            CompletionCode::InvalidCommand => 0xC1,
            CompletionCode::OutOfSpace => 0xC4,
            CompletionCode::InvalidReservation => 0xC5,
            CompletionCode::RequestDataLengthInvalid => 0xC7,
            CompletionCode::RequestedDataLengthExceeded => 0xC8,
            CompletionCode::ParameterOutOfRange => 0xC9,
            CompletionCode::NotPresent => 0xCB,
            CompletionCode::InvalidDataField => 0xCC,
            CompletionCode::NotSupportedInPresentState => 0xD5,
            CompletionCode::Unspecified => 0xFF,
        }
    }
}

impl From<CompletionCode> for u8 {
    fn from(value: CompletionCode) -> Self {
        value.value()
    }
}
