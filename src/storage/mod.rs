//! The storage side of a managed controller: System Event Log, SDR
//! repositories and FRU inventory, together with the storage-netfn command
//! handlers.

mod fru;
pub use fru::FruArea;

mod sel;
pub use sel::{Sel, SelFlags};

mod sdr;
pub use sdr::{SdrFlags, SdrRepository, UpdateSupport, MAX_NUM_SDRS, MAX_SDR_LENGTH};
pub(crate) use sdr::{
    PartialAdd, GET_DEVICE_SDR_CMD, GET_DEVICE_SDR_INFO_CMD, RESERVE_DEVICE_SDR_REPOSITORY_CMD,
};

use crate::{
    connection::{CompletionCode, Message, ResponseBuffer},
    emu::Mc,
};

/// An IPMI timestamp: seconds since the UNIX epoch, as stored in SEL
/// records and repository info responses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp(u32);

impl Timestamp {
    /// The raw seconds value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[cfg(feature = "time")]
        {
            let timestamp = time::OffsetDateTime::from_unix_timestamp(self.0 as i64)
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);

            match timestamp.format(&time::format_description::well_known::Rfc3339) {
                Ok(time) => write!(f, "{}", time),
                Err(_) => write!(f, "{}", self.0),
            }
        }

        #[cfg(not(feature = "time"))]
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Mc {
    pub(crate) fn handle_storage_netfn(
        &mut self,
        msg: &Message,
        rsp: &mut ResponseBuffer,
    ) {
        match msg.cmd() {
            sel::GET_SEL_INFO_CMD => self.get_sel_info(rsp),
            sel::GET_SEL_ALLOCATION_INFO_CMD => self.get_sel_allocation_info(rsp),
            sel::RESERVE_SEL_CMD => self.reserve_sel(rsp),
            sel::GET_SEL_ENTRY_CMD => self.get_sel_entry(msg, rsp),
            sel::ADD_SEL_ENTRY_CMD => self.add_sel_entry(msg, rsp),
            sel::DELETE_SEL_ENTRY_CMD => self.delete_sel_entry(msg, rsp),
            sel::CLEAR_SEL_CMD => self.clear_sel(msg, rsp),
            sel::GET_SEL_TIME_CMD => self.get_sel_time(rsp),
            sel::SET_SEL_TIME_CMD => self.set_sel_time(msg, rsp),

            // Partial SEL adds are not implemented; they fall through to
            // the invalid-command response below.
            sdr::GET_SDR_REPOSITORY_INFO_CMD => self.get_sdr_repository_info(rsp),
            sdr::GET_SDR_REPOSITORY_ALLOC_INFO_CMD => self.get_sdr_repository_alloc_info(rsp),
            sdr::RESERVE_SDR_REPOSITORY_CMD => self.reserve_sdr_repository(rsp),
            sdr::GET_SDR_CMD => self.get_sdr(msg, rsp),
            sdr::ADD_SDR_CMD => self.add_sdr(msg, rsp),
            sdr::PARTIAL_ADD_SDR_CMD => self.partial_add_sdr(msg, rsp),
            sdr::DELETE_SDR_CMD => self.delete_sdr(msg, rsp),
            sdr::CLEAR_SDR_REPOSITORY_CMD => self.clear_sdr_repository(msg, rsp),
            sdr::GET_SDR_REPOSITORY_TIME_CMD => self.get_sdr_repository_time(rsp),
            sdr::SET_SDR_REPOSITORY_TIME_CMD => self.set_sdr_repository_time(msg, rsp),
            sdr::ENTER_SDR_REPOSITORY_UPDATE_CMD => self.enter_sdr_repository_update(rsp),
            sdr::EXIT_SDR_REPOSITORY_UPDATE_CMD => self.exit_sdr_repository_update(rsp),

            fru::GET_FRU_INVENTORY_AREA_INFO_CMD => self.get_fru_inventory_area_info(msg, rsp),
            fru::READ_FRU_DATA_CMD => self.read_fru_data(msg, rsp),
            fru::WRITE_FRU_DATA_CMD => self.write_fru_data(msg, rsp),

            _ => rsp.fail(CompletionCode::InvalidCommand),
        }
    }
}
