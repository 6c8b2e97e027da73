//! The emulator proper: the managed-controller registry and the command
//! dispatcher that routes IPMI requests into it.

mod mc;
pub use mc::{DeviceSupport, Mc, McConfig};
pub(crate) use mc::GET_DEVICE_ID_CMD;

mod sensor;
pub use sensor::{
    EventSupport, HysteresisSupport, Sensor, SensorEventConfig, ThresholdAccess,
    EVENT_READING_TYPE_THRESHOLD,
};

use std::sync::Arc;

use nonmax::NonMaxU8;

use crate::{
    connection::{Checksum, CompletionCode, LogicalUnit, Message, NetFn, ResponseBuffer},
    EmuError, TimeSource, WallClock,
};

/// An event produced while executing a command, waiting to be appended to
/// the receiver MC's SEL once the command has finished.
pub(crate) struct PendingEvent {
    pub(crate) receiver: u8,
    pub(crate) record_type: u8,
    pub(crate) data: [u8; 13],
}

/// Common request underflow check: writes the failure response and returns
/// true when the message carries fewer than `len` data bytes.
pub(crate) fn check_msg_length(msg: &Message, len: usize, rsp: &mut ResponseBuffer) -> bool {
    if msg.data().len() < len {
        rsp.fail(CompletionCode::RequestDataLengthInvalid);
        true
    } else {
        false
    }
}

/// The emulator: up to 128 managed controllers indexed by IPMB address,
/// one of which acts as the BMC, plus the dispatcher that executes IPMI
/// requests against them.
pub struct Emulator {
    mcs: [Option<Box<Mc>>; 128],
    bmc_mc: u8,
    clock: Arc<dyn TimeSource + Send + Sync>,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    /// An emulator reading the system wall clock.
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(WallClock))
    }

    /// An emulator with an injected clock, for deterministic tests.
    pub fn with_time_source(clock: Arc<dyn TimeSource + Send + Sync>) -> Self {
        Self {
            mcs: std::array::from_fn(|_| None),
            bmc_mc: 0,
            clock,
        }
    }

    /// Register a managed controller.
    ///
    /// IPMB addresses are always even. Installing at an occupied slot
    /// destroys the previous MC and all of its owned state first.
    pub fn add_mc(&mut self, config: McConfig) -> Result<(), EmuError> {
        if config.ipmb & 1 != 0 {
            return Err(EmuError::InvalidArgument("ipmb address"));
        }

        let index = (config.ipmb >> 1) as usize;
        self.mcs[index] = Some(Box::new(Mc::new(config, self.clock.clone())));
        Ok(())
    }

    /// Designate the MC that answers un-encapsulated requests.
    pub fn set_bmc_mc(&mut self, ipmb: u8) -> Result<(), EmuError> {
        if ipmb & 1 != 0 {
            return Err(EmuError::InvalidArgument("ipmb address"));
        }

        self.bmc_mc = ipmb;
        Ok(())
    }

    /// The IPMB address of the designated BMC MC.
    pub fn bmc_mc(&self) -> u8 {
        self.bmc_mc
    }

    /// Look up an MC by its IPMB address.
    pub fn mc_by_addr(&self, ipmb: u8) -> Option<&Mc> {
        if ipmb & 1 != 0 {
            return None;
        }
        self.mcs[(ipmb >> 1) as usize].as_deref()
    }

    /// Look up an MC by its IPMB address, mutably.
    pub fn mc_by_addr_mut(&mut self, ipmb: u8) -> Option<&mut Mc> {
        if ipmb & 1 != 0 {
            return None;
        }
        self.mcs[(ipmb >> 1) as usize].as_deref_mut()
    }

    /// Execute one IPMI request and write the response.
    ///
    /// `Send Message` requests are unwrapped and executed inside the
    /// addressed MC; everything else runs against the BMC MC. Any sensor
    /// events triggered by the command are appended to their receiver's SEL
    /// before this returns.
    pub fn handle_msg(&mut self, lun: LogicalUnit, msg: &Message, rsp: &mut ResponseBuffer) {
        let mut events = Vec::new();

        if msg.netfn_raw() == NetFn::App.request_value() && msg.cmd() == mc::SEND_MSG_CMD {
            self.handle_send_msg(msg, rsp, &mut events);
        } else {
            match self.mcs[(self.bmc_mc >> 1) as usize].as_deref_mut() {
                Some(mc) => route_command(mc, lun, msg, rsp, &mut events),
                None => rsp.fail(CompletionCode::Unspecified),
            }
        }

        self.deliver_events(events);
    }

    /// Unwrap an encapsulated IPMB request, execute it in the addressed MC
    /// and wrap the response back into an IPMB frame.
    fn handle_send_msg(
        &mut self,
        msg: &Message,
        rsp: &mut ResponseBuffer,
        events: &mut Vec<PendingEvent>,
    ) {
        if check_msg_length(msg, 8, rsp) {
            return;
        }

        let data = msg.data();
        if data[0] & 0x3F != 0 {
            return rsp.fail(CompletionCode::InvalidDataField);
        }

        // Skip the channel byte; a leading zero slave address marks a
        // broadcast and is consumed as well.
        let mut frame = &data[1..];
        if frame[0] == 0 {
            frame = &frame[1..];
            if frame.len() < 7 {
                return rsp.fail(CompletionCode::RequestDataLengthInvalid);
            }
        }

        let slave = frame[0];
        let netfn = frame[1] >> 2;
        let inner_lun = LogicalUnit::from_low_bits(frame[1]);
        let rq_lun_bits = frame[1] & 0x03;
        let seq_lun = frame[4];
        let cmd = frame[5];

        let Some(mc) = self.mcs[(slave >> 1) as usize].as_deref_mut() else {
            return rsp.fail(CompletionCode::NakOnWrite);
        };

        // The payload sits between the frame header and the trailing
        // checksum.
        let inner = Message::new_raw(netfn, cmd, frame[6..frame.len() - 1].to_vec());
        route_command(mc, inner_lun, &inner, rsp, events);

        let body = rsp.take();
        let mut out = Vec::with_capacity(body.len() + 8);
        out.push(0);
        out.push(self.bmc_mc);
        out.push(((netfn | 1) << 2) | (seq_lun & 0x3));
        out.push(Checksum::of(&out[1..3]));
        out.push(slave);
        out.push((seq_lun & 0xFC) | rq_lun_bits);
        out.push(cmd);
        out.extend_from_slice(&body);
        out.push(Checksum::of(&out));
        rsp.set(out);
    }

    /// Append gathered events to their receivers' SELs, in trigger order.
    /// The receiver is resolved through the registry here, at delivery
    /// time; unknown receivers drop the event silently, as do SELs that are
    /// full or unsupported.
    fn deliver_events(&mut self, events: Vec<PendingEvent>) {
        for event in events {
            let Some(mc) = self.mc_by_addr_mut(event.receiver) else {
                continue;
            };
            let _ = mc.add_to_sel(event.record_type, &event.data);
        }
    }

    /// Host-side: set a sensor's raw value and re-evaluate its thresholds,
    /// generating events if `gen_event` is set.
    pub fn sensor_set_value(
        &mut self,
        ipmb: u8,
        lun: LogicalUnit,
        num: NonMaxU8,
        value: u8,
        gen_event: bool,
    ) -> Result<(), EmuError> {
        let mut events = Vec::new();

        self.mc_by_addr_mut(ipmb)
            .ok_or(EmuError::InvalidArgument("ipmb address"))?
            .sensor_set_value_internal(lun, num, value, gen_event, &mut events)?;

        self.deliver_events(events);
        Ok(())
    }

    /// Host-side: set or clear one discrete status bit on a sensor,
    /// generating an event on change if `gen_event` is set.
    pub fn sensor_set_bit(
        &mut self,
        ipmb: u8,
        lun: LogicalUnit,
        num: NonMaxU8,
        bit: u8,
        value: bool,
        gen_event: bool,
    ) -> Result<(), EmuError> {
        let mut events = Vec::new();

        self.mc_by_addr_mut(ipmb)
            .ok_or(EmuError::InvalidArgument("ipmb address"))?
            .sensor_set_bit_internal(lun, num, bit, value, gen_event, &mut events)?;

        self.deliver_events(events);
        Ok(())
    }

    /// Host-side: set an MC's power byte, generating an OEM event on change
    /// if `gen_event` is set.
    pub fn set_power(&mut self, ipmb: u8, power: u8, gen_event: bool) -> Result<(), EmuError> {
        let mut events = Vec::new();

        self.mc_by_addr_mut(ipmb)
            .ok_or(EmuError::InvalidArgument("ipmb address"))?
            .set_power_internal(power, gen_event, &mut events);

        self.deliver_events(events);
        Ok(())
    }
}

fn route_command(
    mc: &mut Mc,
    lun: LogicalUnit,
    msg: &Message,
    rsp: &mut ResponseBuffer,
    events: &mut Vec<PendingEvent>,
) {
    match NetFn::from_request(msg.netfn_raw()) {
        Some(NetFn::App) => mc.handle_app_netfn(msg, rsp),
        Some(NetFn::SensorEvent) => mc.handle_sensor_event_netfn(lun, msg, rsp, events),
        Some(NetFn::Storage) => mc.handle_storage_netfn(msg, rsp),
        Some(NetFn::Oem0) => mc.handle_oem0_netfn(msg, rsp, events),
        None => rsp.fail(CompletionCode::InvalidCommand),
    }
}
