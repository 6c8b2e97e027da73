use nonmax::NonMaxU8;

use crate::{
    connection::{CompletionCode, LogicalUnit, Message, ResponseBuffer},
    storage::{GET_DEVICE_SDR_CMD, GET_DEVICE_SDR_INFO_CMD, RESERVE_DEVICE_SDR_REPOSITORY_CMD},
    EmuError,
};

use super::{check_msg_length, DeviceSupport, Mc, PendingEvent};

/// The event/reading type code of threshold-based sensors.
pub const EVENT_READING_TYPE_THRESHOLD: u8 = 0x01;

const SET_EVENT_RECEIVER_CMD: u8 = 0x00;
const GET_EVENT_RECEIVER_CMD: u8 = 0x01;
const GET_SENSOR_READING_FACTORS_CMD: u8 = 0x23;
const SET_SENSOR_HYSTERESIS_CMD: u8 = 0x24;
const GET_SENSOR_HYSTERESIS_CMD: u8 = 0x25;
const SET_SENSOR_THRESHOLD_CMD: u8 = 0x26;
const GET_SENSOR_THRESHOLD_CMD: u8 = 0x27;
const SET_SENSOR_EVENT_ENABLE_CMD: u8 = 0x28;
const GET_SENSOR_EVENT_ENABLE_CMD: u8 = 0x29;
const REARM_SENSOR_EVENTS_CMD: u8 = 0x2A;
const GET_SENSOR_EVENT_STATUS_CMD: u8 = 0x2B;
const GET_SENSOR_READING_CMD: u8 = 0x2D;
const SET_SENSOR_TYPE_CMD: u8 = 0x2E;
const GET_SENSOR_TYPE_CMD: u8 = 0x2F;

/// How a sensor's hysteresis values may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HysteresisSupport {
    #[default]
    None,
    Readable,
    Settable,
    Fixed,
}

/// How a sensor's thresholds may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdAccess {
    #[default]
    None,
    Readable,
    Settable,
    Fixed,
}

/// How a sensor's event generation may be controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSupport {
    /// Per-event enables are settable.
    #[default]
    PerState,
    /// Only the whole-sensor enables are settable.
    EntireSensor,
    /// Only the global enable applies.
    GlobalEnable,
    /// No event control at all.
    None,
}

/// Whether an event reports a state being entered or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventDirection {
    Assert,
    Deassert,
}

impl EventDirection {
    fn bit(&self) -> u8 {
        match self {
            EventDirection::Assert => 0,
            EventDirection::Deassert => 1,
        }
    }
}

/// Host-side bundle for configuring a sensor's event generation in one
/// call.
#[derive(Debug, Clone, Default)]
pub struct SensorEventConfig {
    pub events_enabled: bool,
    pub scanning_enabled: bool,
    pub support: EventSupport,
    pub assert_supported: [bool; 15],
    pub deassert_supported: [bool; 15],
    pub assert_enabled: [bool; 15],
    pub deassert_enabled: [bool; 15],
}

/// One emulated sensor.
///
/// Thresholds are indexed 0..6 in the order low-noncritical, low-critical,
/// low-nonrecoverable, high-noncritical, high-critical, high-nonrecoverable.
/// Event state arrays are indexed by event offset; index 0 of the
/// two-dimensional arrays is assertion, index 1 deassertion.
#[derive(Debug, Clone)]
pub struct Sensor {
    num: u8,
    lun: LogicalUnit,
    scanning_enabled: bool,
    events_enabled: bool,

    sensor_type: u8,
    event_reading_code: u8,

    value: u8,

    hysteresis_support: HysteresisSupport,
    positive_hysteresis: u8,
    negative_hysteresis: u8,

    threshold_support: ThresholdAccess,
    threshold_supported: [bool; 6],
    thresholds: [u8; 6],

    event_support: EventSupport,
    event_supported: [[bool; 15]; 2],
    event_enabled: [[bool; 15]; 2],

    event_status: [bool; 15],
}

impl Sensor {
    fn new(lun: LogicalUnit, num: u8, sensor_type: u8, event_reading_code: u8) -> Self {
        Self {
            num,
            lun,
            scanning_enabled: false,
            events_enabled: false,
            sensor_type,
            event_reading_code,
            value: 0,
            hysteresis_support: HysteresisSupport::default(),
            positive_hysteresis: 0,
            negative_hysteresis: 0,
            threshold_support: ThresholdAccess::default(),
            threshold_supported: [false; 6],
            thresholds: [0; 6],
            event_support: EventSupport::default(),
            event_supported: [[false; 15]; 2],
            event_enabled: [[false; 15]; 2],
            event_status: [false; 15],
        }
    }

    /// The current raw reading.
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn sensor_type(&self) -> u8 {
        self.sensor_type
    }

    pub fn event_reading_code(&self) -> u8 {
        self.event_reading_code
    }

    pub fn events_enabled(&self) -> bool {
        self.events_enabled
    }

    pub fn scanning_enabled(&self) -> bool {
        self.scanning_enabled
    }

    /// The current state of one event-status bit.
    pub fn event_status(&self, bit: usize) -> bool {
        self.event_status[bit]
    }
}

/// Queue an event frame for the MC's event receiver, if the sensor and the
/// caller both allow it. The timestamp bytes stay zero; the receiving SEL
/// stamps its own time.
fn emit(
    sensor: &Sensor,
    generator: u8,
    receiver: u8,
    gen_event: bool,
    direction: EventDirection,
    byte1: u8,
    byte2: u8,
    byte3: u8,
    events: &mut Vec<PendingEvent>,
) {
    if receiver == 0 || !sensor.events_enabled || !gen_event {
        return;
    }

    let mut data = [0u8; 13];
    data[4] = generator;
    data[5] = sensor.lun.value();
    data[6] = 0x04; // event message revision, IPMI 1.5
    data[7] = sensor.sensor_type;
    data[8] = sensor.num;
    data[9] = (direction.bit() << 7) | sensor.event_reading_code;
    data[10] = byte1;
    data[11] = byte2;
    data[12] = byte3;

    events.push(PendingEvent {
        receiver,
        record_type: 0x02,
        data,
    });
}

/// Re-evaluate every supported threshold against the current value.
///
/// Low thresholds assert when the value is at or below them and deassert
/// only once the value minus the negative hysteresis has passed back above;
/// high thresholds mirror that with the positive hysteresis. A sensor that
/// has crossed a threshold therefore stays asserted anywhere inside the
/// hysteresis band.
fn check_thresholds(
    sensor: &mut Sensor,
    generator: u8,
    receiver: u8,
    gen_event: bool,
    events: &mut Vec<PendingEvent>,
) {
    let mut to_set = [false; 6];
    let mut to_clear = [false; 6];

    for i in 0..3 {
        if sensor.threshold_supported[i] {
            if sensor.value <= sensor.thresholds[i] {
                to_set[i] = true;
            } else if sensor.value as i32 - sensor.negative_hysteresis as i32
                > sensor.thresholds[i] as i32
            {
                to_clear[i] = true;
            }
        }
    }
    for i in 3..6 {
        if sensor.threshold_supported[i] {
            if sensor.value >= sensor.thresholds[i] {
                to_set[i] = true;
            } else if (sensor.value as i32 + sensor.positive_hysteresis as i32)
                < sensor.thresholds[i] as i32
            {
                to_clear[i] = true;
            }
        }
    }

    for i in 0..6 {
        // Low thresholds report on even event offsets, high ones on odd.
        let offset = if i < 3 { i * 2 } else { i * 2 + 1 };

        if to_set[i] && !sensor.event_status[i] {
            sensor.event_status[i] = true;
            if sensor.event_enabled[0][offset] {
                let (value, threshold) = (sensor.value, sensor.thresholds[i]);
                emit(
                    sensor,
                    generator,
                    receiver,
                    gen_event,
                    EventDirection::Assert,
                    0x50 | offset as u8,
                    value,
                    threshold,
                    events,
                );
            }
        } else if to_clear[i] && sensor.event_status[i] {
            sensor.event_status[i] = false;
            if sensor.event_enabled[1][offset] {
                let (value, threshold) = (sensor.value, sensor.thresholds[i]);
                emit(
                    sensor,
                    generator,
                    receiver,
                    gen_event,
                    EventDirection::Deassert,
                    0x50 | offset as u8,
                    value,
                    threshold,
                    events,
                );
            }
        }
    }
}

/// Flip one discrete status bit, emitting an event when the bit actually
/// changes and that direction is enabled.
fn set_bit(
    sensor: &mut Sensor,
    generator: u8,
    receiver: u8,
    bit: usize,
    value: bool,
    gen_event: bool,
    events: &mut Vec<PendingEvent>,
) {
    if value == sensor.event_status[bit] {
        return;
    }

    sensor.event_status[bit] = value;

    if value && sensor.event_enabled[0][bit] {
        emit(
            sensor,
            generator,
            receiver,
            gen_event,
            EventDirection::Assert,
            bit as u8,
            0,
            0,
            events,
        );
    } else if !value && sensor.event_enabled[1][bit] {
        emit(
            sensor,
            generator,
            receiver,
            gen_event,
            EventDirection::Deassert,
            bit as u8,
            0,
            0,
            events,
        );
    }
}

impl Mc {
    /// Host-side: create a sensor at `(lun, num)`. The slot must be empty.
    pub fn add_sensor(
        &mut self,
        lun: LogicalUnit,
        num: NonMaxU8,
        sensor_type: u8,
        event_reading_code: u8,
    ) -> Result<(), EmuError> {
        let slot = &mut self.sensors[lun.value() as usize][num.get() as usize];
        if slot.is_some() {
            return Err(EmuError::InvalidArgument("sensor already present"));
        }

        *slot = Some(Box::new(Sensor::new(
            lun,
            num.get(),
            sensor_type,
            event_reading_code,
        )));
        Ok(())
    }

    /// The sensor at `(lun, num)`, if one exists.
    pub fn sensor(&self, lun: LogicalUnit, num: NonMaxU8) -> Option<&Sensor> {
        self.sensors[lun.value() as usize][num.get() as usize].as_deref()
    }

    fn sensor_mut(&mut self, lun: LogicalUnit, num: NonMaxU8) -> Result<&mut Sensor, EmuError> {
        self.sensors[lun.value() as usize][num.get() as usize]
            .as_deref_mut()
            .ok_or(EmuError::InvalidArgument("no such sensor"))
    }

    /// Host-side: configure hysteresis access and values.
    pub fn sensor_set_hysteresis(
        &mut self,
        lun: LogicalUnit,
        num: NonMaxU8,
        support: HysteresisSupport,
        positive: u8,
        negative: u8,
    ) -> Result<(), EmuError> {
        let sensor = self.sensor_mut(lun, num)?;
        sensor.hysteresis_support = support;
        sensor.positive_hysteresis = positive;
        sensor.negative_hysteresis = negative;
        Ok(())
    }

    /// Host-side: configure threshold access, the supported set and the
    /// threshold values. Does not re-evaluate the sensor.
    pub fn sensor_set_threshold(
        &mut self,
        lun: LogicalUnit,
        num: NonMaxU8,
        support: ThresholdAccess,
        supported: [bool; 6],
        values: [u8; 6],
    ) -> Result<(), EmuError> {
        let sensor = self.sensor_mut(lun, num)?;
        sensor.threshold_support = support;
        sensor.threshold_supported = supported;
        sensor.thresholds = values;
        Ok(())
    }

    /// Host-side: configure event generation in one call.
    pub fn sensor_set_event_support(
        &mut self,
        lun: LogicalUnit,
        num: NonMaxU8,
        config: SensorEventConfig,
    ) -> Result<(), EmuError> {
        let sensor = self.sensor_mut(lun, num)?;
        sensor.events_enabled = config.events_enabled;
        sensor.scanning_enabled = config.scanning_enabled;
        sensor.event_support = config.support;
        sensor.event_supported = [config.assert_supported, config.deassert_supported];
        sensor.event_enabled = [config.assert_enabled, config.deassert_enabled];
        Ok(())
    }

    pub(crate) fn sensor_set_value_internal(
        &mut self,
        lun: LogicalUnit,
        num: NonMaxU8,
        value: u8,
        gen_event: bool,
        events: &mut Vec<PendingEvent>,
    ) -> Result<(), EmuError> {
        let (generator, receiver) = (self.ipmb, self.event_receiver);

        let sensor = self.sensor_mut(lun, num)?;
        sensor.value = value;
        check_thresholds(sensor, generator, receiver, gen_event, events);
        Ok(())
    }

    pub(crate) fn sensor_set_bit_internal(
        &mut self,
        lun: LogicalUnit,
        num: NonMaxU8,
        bit: u8,
        value: bool,
        gen_event: bool,
        events: &mut Vec<PendingEvent>,
    ) -> Result<(), EmuError> {
        if bit >= 15 {
            return Err(EmuError::InvalidArgument("event bit"));
        }

        let (generator, receiver) = (self.ipmb, self.event_receiver);

        let sensor = self.sensor_mut(lun, num)?;
        set_bit(
            sensor,
            generator,
            receiver,
            bit as usize,
            value,
            gen_event,
            events,
        );
        Ok(())
    }

    pub(crate) fn handle_sensor_event_netfn(
        &mut self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
        events: &mut Vec<PendingEvent>,
    ) {
        match msg.cmd() {
            SET_EVENT_RECEIVER_CMD => self.set_event_receiver_cmd(msg, rsp),
            GET_EVENT_RECEIVER_CMD => self.get_event_receiver_cmd(rsp),

            GET_DEVICE_SDR_INFO_CMD => self.get_device_sdr_info(lun, rsp),
            GET_DEVICE_SDR_CMD => self.get_device_sdr(lun, msg, rsp),
            RESERVE_DEVICE_SDR_REPOSITORY_CMD => self.reserve_device_sdr_repository(lun, rsp),

            SET_SENSOR_HYSTERESIS_CMD => self.set_sensor_hysteresis_cmd(lun, msg, rsp),
            GET_SENSOR_HYSTERESIS_CMD => self.get_sensor_hysteresis_cmd(lun, msg, rsp),
            SET_SENSOR_THRESHOLD_CMD => self.set_sensor_thresholds_cmd(lun, msg, rsp, events),
            GET_SENSOR_THRESHOLD_CMD => self.get_sensor_thresholds_cmd(lun, msg, rsp),
            SET_SENSOR_EVENT_ENABLE_CMD => self.set_sensor_event_enable_cmd(lun, msg, rsp),
            GET_SENSOR_EVENT_ENABLE_CMD => self.get_sensor_event_enable_cmd(lun, msg, rsp),
            GET_SENSOR_TYPE_CMD => self.get_sensor_type_cmd(lun, msg, rsp),
            GET_SENSOR_READING_CMD => self.get_sensor_reading_cmd(lun, msg, rsp),

            // Not implemented: event status, rearm, reading factors and
            // set-sensor-type all report invalid command.
            GET_SENSOR_EVENT_STATUS_CMD
            | REARM_SENSOR_EVENTS_CMD
            | GET_SENSOR_READING_FACTORS_CMD
            | SET_SENSOR_TYPE_CMD => rsp.fail(CompletionCode::InvalidCommand),

            _ => rsp.fail(CompletionCode::InvalidCommand),
        }
    }

    fn set_event_receiver_cmd(&mut self, msg: &Message, rsp: &mut ResponseBuffer) {
        if !self
            .device_support
            .contains(DeviceSupport::IPMB_EVENT_GENERATOR)
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        if check_msg_length(msg, 2, rsp) {
            return;
        }

        let data = msg.data();
        self.event_receiver = data[0] & 0xFE;
        self.event_receiver_lun = data[1] & 0x3;

        rsp.set(vec![0]);
    }

    fn get_event_receiver_cmd(&self, rsp: &mut ResponseBuffer) {
        if !self
            .device_support
            .contains(DeviceSupport::IPMB_EVENT_GENERATOR)
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        rsp.set(vec![0, self.event_receiver, self.event_receiver_lun & 0x3]);
    }

    /// The sensor named by a wire sensor-number byte; 255 and empty slots
    /// are both absent.
    fn wire_sensor(&self, lun: LogicalUnit, num: u8) -> Option<&Sensor> {
        let num = NonMaxU8::new(num)?;
        self.sensors[lun.value() as usize][num.get() as usize].as_deref()
    }

    fn wire_sensor_mut(&mut self, lun: LogicalUnit, num: u8) -> Option<&mut Sensor> {
        let num = NonMaxU8::new(num)?;
        self.sensors[lun.value() as usize][num.get() as usize].as_deref_mut()
    }

    fn set_sensor_hysteresis_cmd(
        &mut self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
    ) {
        if check_msg_length(msg, 4, rsp) {
            return;
        }

        let data = msg.data();
        let Some(sensor) = self.wire_sensor_mut(lun, data[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        if sensor.hysteresis_support != HysteresisSupport::Settable {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        sensor.positive_hysteresis = data[2];
        sensor.negative_hysteresis = data[3];

        rsp.set(vec![0]);
    }

    fn get_sensor_hysteresis_cmd(
        &self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
    ) {
        if check_msg_length(msg, 1, rsp) {
            return;
        }

        let Some(sensor) = self.wire_sensor(lun, msg.data()[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        if sensor.hysteresis_support != HysteresisSupport::Settable
            && sensor.hysteresis_support != HysteresisSupport::Readable
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        rsp.set(vec![
            0,
            sensor.positive_hysteresis,
            sensor.negative_hysteresis,
        ]);
    }

    fn set_sensor_thresholds_cmd(
        &mut self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
        events: &mut Vec<PendingEvent>,
    ) {
        if check_msg_length(msg, 8, rsp) {
            return;
        }

        let (generator, receiver) = (self.ipmb, self.event_receiver);

        let data = msg.data();
        let Some(sensor) = self.wire_sensor_mut(lun, data[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        if sensor.event_reading_code != EVENT_READING_TYPE_THRESHOLD
            || sensor.threshold_support != ThresholdAccess::Settable
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        for i in 0..6 {
            if data[1] & (1 << i) != 0 && !sensor.threshold_supported[i] {
                return rsp.fail(CompletionCode::InvalidDataField);
            }
        }

        for i in 0..6 {
            if data[1] & (1 << i) != 0 {
                sensor.thresholds[i] = data[i + 2];
            }
        }

        check_thresholds(sensor, generator, receiver, true, events);

        rsp.set(vec![0]);
    }

    fn get_sensor_thresholds_cmd(
        &self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
    ) {
        if check_msg_length(msg, 1, rsp) {
            return;
        }

        let Some(sensor) = self.wire_sensor(lun, msg.data()[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        if sensor.event_reading_code != EVENT_READING_TYPE_THRESHOLD
            || (sensor.threshold_support != ThresholdAccess::Settable
                && sensor.threshold_support != ThresholdAccess::Readable)
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        let mut data = vec![0u8; 8];
        for i in 0..6 {
            if sensor.threshold_supported[i] {
                data[1] |= 1 << i;
                data[2 + i] = sensor.thresholds[i];
            }
        }
        rsp.set(data);
    }

    fn set_sensor_event_enable_cmd(
        &mut self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
    ) {
        if check_msg_length(msg, 2, rsp) {
            return;
        }

        let data = msg.data();
        let Some(sensor) = self.wire_sensor_mut(lun, data[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        if sensor.event_support == EventSupport::None
            || sensor.event_support == EventSupport::GlobalEnable
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        let op = (data[1] >> 4) & 0x3;
        if sensor.event_support == EventSupport::EntireSensor && op != 0 {
            return rsp.fail(CompletionCode::InvalidDataField);
        }
        if op == 3 {
            return rsp.fail(CompletionCode::InvalidDataField);
        }

        sensor.events_enabled = data[1] & 0x80 != 0;
        sensor.scanning_enabled = data[1] & 0x40 != 0;

        if op != 0 {
            let enable = op == 1;

            // Bytes 2..4 select assertion events, 4..6 deassertion; only 15
            // event offsets exist, so the top bit of the second mask byte is
            // ignored. Truncated masks apply as far as they go.
            for (direction, first) in [(0, 2usize), (1, 4usize)] {
                for i in 0..2 {
                    let Some(mask) = data.get(first + i) else {
                        break;
                    };
                    for j in 0..8 {
                        let offset = i * 8 + j;
                        if offset < 15 && mask & (1 << j) != 0 {
                            sensor.event_enabled[direction][offset] = enable;
                        }
                    }
                }
            }
        }

        rsp.set(vec![0]);
    }

    fn get_sensor_event_enable_cmd(
        &self,
        lun: LogicalUnit,
        msg: &Message,
        rsp: &mut ResponseBuffer,
    ) {
        if check_msg_length(msg, 1, rsp) {
            return;
        }

        let Some(sensor) = self.wire_sensor(lun, msg.data()[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        if sensor.event_support == EventSupport::None
            || sensor.event_support == EventSupport::GlobalEnable
        {
            return rsp.fail(CompletionCode::InvalidCommand);
        }

        let mut data = vec![
            0,
            ((sensor.events_enabled as u8) << 7) | ((sensor.scanning_enabled as u8) << 6),
        ];

        if sensor.event_support == EventSupport::EntireSensor {
            return rsp.set(data);
        }

        for direction in 0..2 {
            for i in 0..2 {
                let mut byte = 0u8;
                for j in 0..8 {
                    let offset = i * 8 + j;
                    if offset < 15 && sensor.event_enabled[direction][offset] {
                        byte |= 1 << j;
                    }
                }
                data.push(byte);
            }
        }

        rsp.set(data);
    }

    fn get_sensor_type_cmd(&self, lun: LogicalUnit, msg: &Message, rsp: &mut ResponseBuffer) {
        if check_msg_length(msg, 1, rsp) {
            return;
        }

        let Some(sensor) = self.wire_sensor(lun, msg.data()[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        rsp.set(vec![0, sensor.sensor_type, sensor.event_reading_code]);
    }

    fn get_sensor_reading_cmd(&self, lun: LogicalUnit, msg: &Message, rsp: &mut ResponseBuffer) {
        if check_msg_length(msg, 1, rsp) {
            return;
        }

        let Some(sensor) = self.wire_sensor(lun, msg.data()[0]) else {
            return rsp.fail(CompletionCode::InvalidDataField);
        };

        let mut data = vec![
            0,
            sensor.value,
            ((sensor.events_enabled as u8) << 7) | ((sensor.scanning_enabled as u8) << 6),
        ];

        for i in 0..2 {
            let mut byte = 0u8;
            for j in 0..8 {
                let offset = i * 8 + j;
                if offset < 15 && sensor.event_status[offset] {
                    byte |= 1 << j;
                }
            }
            data.push(byte);
        }

        rsp.set(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_sensor() -> Sensor {
        let mut sensor = Sensor::new(LogicalUnit::Zero, 5, 0x01, EVENT_READING_TYPE_THRESHOLD);
        sensor.events_enabled = true;
        sensor.threshold_supported[1] = true;
        sensor.thresholds[1] = 20;
        sensor.negative_hysteresis = 3;
        sensor.event_enabled[0][2] = true;
        sensor.event_enabled[1][2] = true;
        sensor
    }

    #[test]
    fn low_threshold_asserts_at_or_below() {
        let mut sensor = threshold_sensor();
        let mut events = Vec::new();

        sensor.value = 15;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);

        assert!(sensor.event_status[1]);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.receiver, 0x20);
        assert_eq!(event.record_type, 0x02);
        assert_eq!(event.data[4], 0x22);
        assert_eq!(event.data[9], EVENT_READING_TYPE_THRESHOLD);
        assert_eq!(event.data[10], 0x52);
        assert_eq!(event.data[11], 15);
        assert_eq!(event.data[12], 20);
    }

    #[test]
    fn deassertion_waits_for_the_hysteresis_band() {
        let mut sensor = threshold_sensor();
        let mut events = Vec::new();

        sensor.value = 15;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        events.clear();

        // 22 - 3 = 19, still inside the band.
        sensor.value = 22;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(sensor.event_status[1]);
        assert!(events.is_empty());

        // 24 - 3 = 21 clears the threshold.
        sensor.value = 24;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(!sensor.event_status[1]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data[9], 0x80 | EVENT_READING_TYPE_THRESHOLD);
        assert_eq!(events[0].data[10], 0x52);
    }

    #[test]
    fn value_below_hysteresis_never_underflows() {
        let mut sensor = threshold_sensor();
        let mut events = Vec::new();

        // Assert first, then move to a value smaller than the hysteresis;
        // the signed comparison must not wrap.
        sensor.value = 2;
        sensor.negative_hysteresis = 10;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(sensor.event_status[1]);

        sensor.value = 5;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(sensor.event_status[1]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn high_threshold_uses_positive_hysteresis() {
        let mut sensor = Sensor::new(LogicalUnit::Zero, 9, 0x01, EVENT_READING_TYPE_THRESHOLD);
        sensor.events_enabled = true;
        sensor.threshold_supported[4] = true;
        sensor.thresholds[4] = 80;
        sensor.positive_hysteresis = 5;
        sensor.event_enabled[0][9] = true;
        sensor.event_enabled[1][9] = true;

        let mut events = Vec::new();

        sensor.value = 80;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(sensor.event_status[4]);
        assert_eq!(events[0].data[10], 0x59);
        events.clear();

        // 78 + 5 = 83 >= 80 keeps the assertion latched.
        sensor.value = 78;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(sensor.event_status[4]);
        assert!(events.is_empty());

        sensor.value = 70;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);
        assert!(!sensor.event_status[4]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn disabled_events_change_state_silently() {
        let mut sensor = threshold_sensor();
        sensor.events_enabled = false;

        let mut events = Vec::new();
        sensor.value = 10;
        check_thresholds(&mut sensor, 0x22, 0x20, true, &mut events);

        assert!(sensor.event_status[1]);
        assert!(events.is_empty());
    }

    #[test]
    fn discrete_bit_emits_on_change_only() {
        let mut sensor = Sensor::new(LogicalUnit::One, 3, 0xC0, 0x6F);
        sensor.events_enabled = true;
        sensor.event_enabled[0][4] = true;
        sensor.event_enabled[1][4] = true;

        let mut events = Vec::new();

        set_bit(&mut sensor, 0x22, 0x20, 4, true, true, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data[10], 4);
        assert_eq!(events[0].data[11], 0);
        assert_eq!(events[0].data[12], 0);

        // Unchanged value: no event.
        set_bit(&mut sensor, 0x22, 0x20, 4, true, true, &mut events);
        assert_eq!(events.len(), 1);

        set_bit(&mut sensor, 0x22, 0x20, 4, false, true, &mut events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].data[9], 0x80 | 0x6F);
    }

    #[test]
    fn missing_receiver_address_suppresses_events() {
        let mut sensor = threshold_sensor();
        let mut events = Vec::new();

        sensor.value = 10;
        check_thresholds(&mut sensor, 0x22, 0x00, true, &mut events);

        assert!(sensor.event_status[1]);
        assert!(events.is_empty());
    }
}
