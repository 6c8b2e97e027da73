//! Brings up a two-node chassis: a BMC at 0x20 and a satellite controller
//! at 0x22 with a temperature sensor pointing its events at the BMC.
//! Sensor values are then swept so the hysteresis behaviour shows up in
//! the BMC's SEL.

use clap::Parser;
use nonmax::NonMaxU8;

use ipmi_emu::{
    channel::{Channel, OemRegistry, SmiRequest},
    connection::{LogicalUnit, Message, NetFn},
    emu::{EventSupport, SensorEventConfig, ThresholdAccess},
    storage::{SelFlags, Timestamp},
    DeviceSupport, Emulator, McConfig,
};

#[derive(Parser)]
struct CliOpts {
    /// Low-critical temperature threshold.
    #[clap(long, default_value = "20")]
    threshold: u8,

    /// Negative hysteresis applied before the threshold deasserts.
    #[clap(long, default_value = "3")]
    hysteresis: u8,
}

fn main() {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or("debug".to_string()))
        .init();

    let opts = CliOpts::parse();

    let mut emu = Emulator::new();

    emu.add_mc(McConfig {
        ipmb: 0x20,
        device_id: 0x01,
        has_device_sdrs: false,
        device_revision: 1,
        major_fw_rev: 1,
        minor_fw_rev: 0,
        device_support: DeviceSupport::from_bits_truncate(0xBF),
        mfg_id: [0x21, 0x43, 0x65],
        product_id: [0x34, 0x12],
        dynamic_sensor_population: false,
    })
    .unwrap();
    emu.set_bmc_mc(0x20).unwrap();

    emu.add_mc(McConfig {
        ipmb: 0x22,
        device_id: 0x02,
        has_device_sdrs: false,
        device_revision: 1,
        major_fw_rev: 1,
        minor_fw_rev: 0,
        device_support: DeviceSupport::SENSOR_DEVICE | DeviceSupport::IPMB_EVENT_GENERATOR,
        mfg_id: [0x21, 0x43, 0x65],
        product_id: [0x35, 0x12],
        dynamic_sensor_population: false,
    })
    .unwrap();

    let bmc = emu.mc_by_addr_mut(0x20).unwrap();
    bmc.enable_sel(32, SelFlags::RESERVE | SelFlags::DELETE | SelFlags::GET_ALLOC_INFO);

    // A temperature sensor on the satellite, reporting into the BMC's SEL.
    let satellite = emu.mc_by_addr_mut(0x22).unwrap();
    let temp = NonMaxU8::new(1).unwrap();
    satellite.add_sensor(LogicalUnit::Zero, temp, 0x01, 0x01).unwrap();
    satellite
        .sensor_set_threshold(
            LogicalUnit::Zero,
            temp,
            ThresholdAccess::Settable,
            [true, true, false, false, false, false],
            [opts.threshold / 2, opts.threshold, 0, 0, 0, 0],
        )
        .unwrap();
    satellite
        .sensor_set_hysteresis(
            LogicalUnit::Zero,
            temp,
            ipmi_emu::emu::HysteresisSupport::Settable,
            0,
            opts.hysteresis,
        )
        .unwrap();

    let mut events = SensorEventConfig {
        events_enabled: true,
        scanning_enabled: true,
        support: EventSupport::PerState,
        ..Default::default()
    };
    for bit in [0, 2] {
        events.assert_supported[bit] = true;
        events.deassert_supported[bit] = true;
        events.assert_enabled[bit] = true;
        events.deassert_enabled[bit] = true;
    }
    satellite
        .sensor_set_event_support(LogicalUnit::Zero, temp, events)
        .unwrap();

    // The session layer would normally own this channel; the demo drives
    // it directly.
    let mut chan = Channel::new(0, std::rc::Rc::new(OemRegistry::new()));
    chan.set_return_rsp(|req, rsp| {
        log::info!(
            "rsp netfn 0x{:02X} cmd 0x{:02X} (channel {}): {:02X?}",
            rsp.netfn,
            rsp.cmd,
            req.channel,
            rsp.data
        );
    });
    chan.init(&mut emu);

    log::info!(
        "channel 0 discovered manufacturer 0x{:06X}, product 0x{:04X}",
        chan.manufacturer_id(),
        chan.product_id()
    );

    // Ask the satellite who it is, through Send Message encapsulation.
    let forward = SmiRequest::new(
        Message::new_request(
            NetFn::App,
            0x34,
            vec![0x00, 0x22, 0x06 << 2, 0x00, 0x20, 0x40, 0x01, 0x00],
        ),
        LogicalUnit::Zero,
    );
    chan.smi_send(&mut emu, &forward);

    // Sweep the temperature through the threshold and back out of the
    // hysteresis band.
    for value in [25u8, 15, opts.threshold + 1, opts.threshold + opts.hysteresis + 1] {
        log::info!("temperature -> {value}");
        emu.sensor_set_value(0x22, LogicalUnit::Zero, temp, value, true)
            .unwrap();
    }

    let sel = emu.mc_by_addr(0x20).unwrap().sel();
    log::info!(
        "BMC SEL: {} records, last add at {}",
        sel.len(),
        sel.last_add_time()
    );
    for record in sel.records() {
        let id = u16::from_le_bytes([record[0], record[1]]);
        let time = Timestamp::from(u32::from_le_bytes([
            record[3], record[4], record[5], record[6],
        ]));
        log::info!(
            "  record 0x{id:04X} type 0x{:02X} at {time}: sensor 0x{:02X} data {:02X?}",
            record[2],
            record[11],
            &record[13..16]
        );
    }
}
