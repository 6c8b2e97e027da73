/// Errors reported by the host-side configuration API.
///
/// These cover programming errors only (bad addresses, duplicate sensors,
/// exhausted stores). Wire-level failures are completion codes written into
/// the response buffer and never surface as an `EmuError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EmuError {
    /// An argument was outside the range the data model allows, or named
    /// an object that does not exist (or already exists).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The managed controller lacks the capability bit the operation
    /// requires.
    #[error("not supported by this managed controller")]
    NotSupported,

    /// A bounded store is exhausted: the SEL is full, or record-id
    /// allocation wrapped a full cycle without finding a free id.
    #[error("out of space")]
    OutOfSpace,
}
