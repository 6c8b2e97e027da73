use nonmax::NonMaxU8;

use crate::{
    connection::{CompletionCode, Message, ResponseBuffer},
    emu::{check_msg_length, DeviceSupport, Mc},
    EmuError,
};

pub(crate) const GET_FRU_INVENTORY_AREA_INFO_CMD: u8 = 0x10;
pub(crate) const READ_FRU_DATA_CMD: u8 = 0x11;
pub(crate) const WRITE_FRU_DATA_CMD: u8 = 0x12;

/// One FRU inventory area: a fixed-size blob supporting byte-granular
/// reads and writes.
#[derive(Debug, Clone)]
pub struct FruArea {
    data: Vec<u8>,
}

impl FruArea {
    /// The size of the area in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the area is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The area contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Mc {
    /// Host-side: install a FRU inventory area of `length` bytes,
    /// zero-filled and then seeded with `data`. An existing area at the
    /// same device id is replaced.
    pub fn add_fru_data(
        &mut self,
        device_id: NonMaxU8,
        length: usize,
        data: &[u8],
    ) -> Result<(), EmuError> {
        if !self.device_support.contains(DeviceSupport::FRU_INVENTORY) {
            return Err(EmuError::NotSupported);
        }

        if data.len() > length {
            return Err(EmuError::InvalidArgument("fru data length"));
        }

        let mut blob = vec![0u8; length];
        blob[..data.len()].copy_from_slice(data);
        self.frus[device_id.get() as usize] = Some(FruArea { data: blob });

        Ok(())
    }

    /// The FRU inventory area at `device_id`, if one is installed.
    pub fn fru_data(&self, device_id: NonMaxU8) -> Option<&FruArea> {
        self.frus[device_id.get() as usize].as_ref()
    }

    /// The installed FRU area named by a wire device-id byte; 255 and empty
    /// slots are both absent.
    fn wire_fru(&self, device_id: u8) -> Option<&FruArea> {
        NonMaxU8::new(device_id).and_then(|id| self.frus[id.get() as usize].as_ref())
    }

    pub(crate) fn get_fru_inventory_area_info(&self, msg: &Message, rsp: &mut ResponseBuffer) {
        if check_msg_length(msg, 1, rsp) {
            return;
        }

        let Some(fru) = self.wire_fru(msg.data()[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        let mut data = vec![0u8; 4];
        data[1..3].copy_from_slice(&(fru.len() as u16).to_le_bytes());
        // Byte 3 zero: the area is accessed by bytes, not words.
        rsp.set(data);
    }

    pub(crate) fn read_fru_data(&self, msg: &Message, rsp: &mut ResponseBuffer) {
        if check_msg_length(msg, 4, rsp) {
            return;
        }

        let data = msg.data();
        let Some(fru) = self.wire_fru(data[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        let offset = u16::from_le_bytes([data[1], data[2]]) as usize;
        let count = data[3] as usize;

        if offset >= fru.len() {
            return rsp.fail(CompletionCode::ParameterOutOfRange);
        }

        let count = count.min(fru.len() - offset);
        if count + 2 > rsp.limit() {
            return rsp.fail(CompletionCode::RequestedDataLengthExceeded);
        }

        let mut out = vec![0u8, count as u8];
        out.extend_from_slice(&fru.data[offset..offset + count]);
        rsp.set(out);
    }

    pub(crate) fn write_fru_data(&mut self, msg: &Message, rsp: &mut ResponseBuffer) {
        if check_msg_length(msg, 3, rsp) {
            return;
        }

        let data = msg.data();
        let Some(id) = NonMaxU8::new(data[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };
        let Some(fru) = self.frus[id.get() as usize].as_mut() else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        let offset = u16::from_le_bytes([data[1], data[2]]) as usize;
        let count = data.len() - 3;

        if offset >= fru.data.len() {
            return rsp.fail(CompletionCode::ParameterOutOfRange);
        }

        if offset + count > fru.data.len() {
            return rsp.fail(CompletionCode::RequestedDataLengthExceeded);
        }

        fru.data[offset..offset + count].copy_from_slice(&data[3..]);
        rsp.set(vec![0, count as u8]);
    }
}
