use std::sync::Arc;

use crate::{
    connection::{CompletionCode, Message, ResponseBuffer},
    storage::{FruArea, SdrRepository, Sel, SelFlags},
    EmuError, TimeSource,
};

use super::{check_msg_length, sensor::Sensor, PendingEvent};

bitflags::bitflags! {
    /// The additional-device-support bitmap reported by `Get Device ID`.
    /// Handlers require the matching bit before executing a command.
    pub struct DeviceSupport: u8 {
        const SENSOR_DEVICE = 1 << 0;
        const SDR_REPOSITORY = 1 << 1;
        const SEL_DEVICE = 1 << 2;
        const FRU_INVENTORY = 1 << 3;
        const IPMB_EVENT_RECEIVER = 1 << 4;
        const IPMB_EVENT_GENERATOR = 1 << 5;
        const BRIDGE = 1 << 6;
        const CHASSIS_DEVICE = 1 << 7;
    }
}

pub(crate) const GET_DEVICE_ID_CMD: u8 = 0x01;
pub(crate) const SEND_MSG_CMD: u8 = 0x34;

const SET_POWER_CMD: u8 = 0x01;
const GET_POWER_CMD: u8 = 0x02;

/// Everything needed to register a managed controller; the identity fields
/// are reported verbatim by `Get Device ID`.
#[derive(Debug, Clone)]
pub struct McConfig {
    /// The MC's IPMB address; must be even.
    pub ipmb: u8,
    pub device_id: u8,
    pub has_device_sdrs: bool,
    /// Device revision, 4 bits.
    pub device_revision: u8,
    /// Major firmware revision, 7 bits.
    pub major_fw_rev: u8,
    pub minor_fw_rev: u8,
    pub device_support: DeviceSupport,
    /// Manufacturer id, 3 bytes little-endian.
    pub mfg_id: [u8; 3],
    /// Product id, 2 bytes little-endian.
    pub product_id: [u8; 2],
    pub dynamic_sensor_population: bool,
}

/// One managed controller: its `Get Device ID` identity plus all the
/// storage it owns.
pub struct Mc {
    pub(crate) ipmb: u8,

    pub(crate) device_id: u8,
    pub(crate) has_device_sdrs: bool,
    pub(crate) device_revision: u8,
    pub(crate) major_fw_rev: u8,
    pub(crate) minor_fw_rev: u8,
    pub(crate) device_support: DeviceSupport,
    pub(crate) mfg_id: [u8; 3],
    pub(crate) product_id: [u8; 2],

    pub(crate) sel: Sel,

    pub(crate) main_sdrs: SdrRepository,
    pub(crate) part_add: Option<crate::storage::PartialAdd>,
    pub(crate) in_update_mode: bool,

    pub(crate) event_receiver: u8,
    pub(crate) event_receiver_lun: u8,

    pub(crate) device_sdrs: [SdrRepository; 4],
    pub(crate) dynamic_sensor_population: bool,
    pub(crate) lun_has_sensors: [bool; 4],
    pub(crate) num_sensors_per_lun: [u8; 4],
    pub(crate) sensors: [[Option<Box<Sensor>>; 255]; 4],
    pub(crate) sensor_population_change_time: u32,

    pub(crate) frus: [Option<FruArea>; 255],

    pub(crate) power_value: u8,

    pub(crate) clock: Arc<dyn TimeSource + Send + Sync>,
}

impl Mc {
    pub(crate) fn new(config: McConfig, clock: Arc<dyn TimeSource + Send + Sync>) -> Self {
        // Emulated IPMI time starts at zero.
        let offset = -(clock.now() as i64);

        Self {
            ipmb: config.ipmb,
            device_id: config.device_id,
            has_device_sdrs: config.has_device_sdrs,
            device_revision: config.device_revision,
            major_fw_rev: config.major_fw_rev,
            minor_fw_rev: config.minor_fw_rev,
            device_support: config.device_support,
            mfg_id: config.mfg_id,
            product_id: config.product_id,
            sel: Sel::new(offset),
            main_sdrs: SdrRepository::new(offset),
            part_add: None,
            in_update_mode: false,
            event_receiver: 0x20,
            event_receiver_lun: 0,
            device_sdrs: std::array::from_fn(|_| SdrRepository::new(offset)),
            dynamic_sensor_population: config.dynamic_sensor_population,
            lun_has_sensors: [false; 4],
            num_sensors_per_lun: [0; 4],
            sensors: std::array::from_fn(|_| std::array::from_fn(|_| None)),
            sensor_population_change_time: 0,
            frus: std::array::from_fn(|_| None),
            power_value: 0,
            clock,
        }
    }

    /// This MC's IPMB address.
    pub fn ipmb(&self) -> u8 {
        self.ipmb
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn set_device_id(&mut self, device_id: u8) {
        self.device_id = device_id;
    }

    pub fn has_device_sdrs(&self) -> bool {
        self.has_device_sdrs
    }

    pub fn set_has_device_sdrs(&mut self, has_device_sdrs: bool) {
        self.has_device_sdrs = has_device_sdrs;
    }

    pub fn device_revision(&self) -> u8 {
        self.device_revision
    }

    pub fn set_device_revision(&mut self, device_revision: u8) {
        self.device_revision = device_revision;
    }

    pub fn major_fw_rev(&self) -> u8 {
        self.major_fw_rev
    }

    pub fn set_major_fw_rev(&mut self, major_fw_rev: u8) {
        self.major_fw_rev = major_fw_rev;
    }

    pub fn minor_fw_rev(&self) -> u8 {
        self.minor_fw_rev
    }

    pub fn set_minor_fw_rev(&mut self, minor_fw_rev: u8) {
        self.minor_fw_rev = minor_fw_rev;
    }

    pub fn device_support(&self) -> DeviceSupport {
        self.device_support
    }

    pub fn set_device_support(&mut self, device_support: DeviceSupport) {
        self.device_support = device_support;
    }

    pub fn mfg_id(&self) -> [u8; 3] {
        self.mfg_id
    }

    pub fn set_mfg_id(&mut self, mfg_id: [u8; 3]) {
        self.mfg_id = mfg_id;
    }

    pub fn product_id(&self) -> [u8; 2] {
        self.product_id
    }

    pub fn set_product_id(&mut self, product_id: [u8; 2]) {
        self.product_id = product_id;
    }

    /// The IPMB address sensor events are sent to; 0 disables event
    /// forwarding.
    pub fn event_receiver(&self) -> u8 {
        self.event_receiver
    }

    /// The LUN within the event receiver.
    pub fn event_receiver_lun(&self) -> u8 {
        self.event_receiver_lun
    }

    /// Point sensor events at another MC. The low address bit and high LUN
    /// bits are masked off, as on the wire.
    pub fn set_event_receiver(&mut self, addr: u8, lun: u8) {
        self.event_receiver = addr & 0xFE;
        self.event_receiver_lun = lun & 0x3;
    }

    /// The power byte driven by the OEM power commands.
    pub fn power(&self) -> u8 {
        self.power_value
    }

    /// This MC's System Event Log.
    pub fn sel(&self) -> &Sel {
        &self.sel
    }

    /// Host-side: (re-)initialise the SEL with a record capacity and
    /// operation-support flags.
    pub fn enable_sel(&mut self, max_entries: u16, flags: SelFlags) {
        self.sel.enable(max_entries, flags);
    }

    /// Append a record to this MC's SEL. Standard record types are
    /// timestamped from the emulator clock; OEM types (0xE0 and above)
    /// keep the caller's 13 bytes verbatim.
    pub fn add_to_sel(&mut self, record_type: u8, event: &[u8; 13]) -> Result<u16, EmuError> {
        if !self.device_support.contains(DeviceSupport::SEL_DEVICE) {
            return Err(EmuError::NotSupported);
        }

        let now = self.clock.now();
        self.sel.add(record_type, event, now)
    }

    pub(crate) fn handle_app_netfn(&self, msg: &Message, rsp: &mut ResponseBuffer) {
        match msg.cmd() {
            GET_DEVICE_ID_CMD => self.get_device_id(rsp),
            _ => rsp.fail(CompletionCode::InvalidCommand),
        }
    }

    fn get_device_id(&self, rsp: &mut ResponseBuffer) {
        let mut data = vec![0u8; 12];
        data[1] = self.device_id;
        data[2] = ((self.has_device_sdrs as u8) << 7) | (self.device_revision & 0xF);
        data[3] = self.major_fw_rev & 0x7F;
        data[4] = self.minor_fw_rev;
        data[5] = 0x51;
        data[6] = self.device_support.bits();
        data[7..10].copy_from_slice(&self.mfg_id);
        data[10..12].copy_from_slice(&self.product_id);
        rsp.set(data);
    }

    pub(crate) fn handle_oem0_netfn(
        &mut self,
        msg: &Message,
        rsp: &mut ResponseBuffer,
        events: &mut Vec<PendingEvent>,
    ) {
        match msg.cmd() {
            SET_POWER_CMD => {
                if check_msg_length(msg, 1, rsp) {
                    return;
                }

                self.set_power_internal(msg.data()[0], true, events);
                rsp.set(vec![0]);
            }
            GET_POWER_CMD => rsp.set(vec![0, self.power_value]),
            _ => rsp.fail(CompletionCode::InvalidCommand),
        }
    }

    pub(crate) fn set_power_internal(
        &mut self,
        power: u8,
        gen_event: bool,
        events: &mut Vec<PendingEvent>,
    ) {
        if self.power_value == power {
            return;
        }

        self.power_value = power;

        if !gen_event || self.event_receiver == 0 {
            return;
        }

        let mut data = [0u8; 13];
        data[4] = 0x20; // power events always originate at the BMC address
        data[6] = 0x01; // control message version 1
        data[10] = power;

        events.push(PendingEvent {
            receiver: self.event_receiver,
            record_type: 0xC0,
            data,
        });
    }
}
