//! The external interface adapter: the small indirection a session layer
//! sees instead of the command engine itself.
//!
//! A [`Channel`] forwards requests into the emulator synchronously and
//! routes every response through an optional OEM response hook before
//! handing it to the session layer's sink. On channel 0 the adapter
//! bootstraps itself: it sends `Get Device ID` into the engine, learns the
//! manufacturer and product ids from the answer, and installs a matching
//! vendor hook from the [`OemRegistry`], if one was registered.

use std::rc::Rc;

use crate::{
    connection::{Address, LogicalUnit, Message, NetFn},
    connection::ResponseBuffer,
    emu::{Emulator, GET_DEVICE_ID_CMD},
};

/// A request as the session layer hands it to the core.
#[derive(Debug, Clone)]
pub struct SmiRequest {
    /// The IPMI message itself.
    pub msg: Message,
    /// The destination LUN within the target MC.
    pub lun: LogicalUnit,
    /// Where the request came from, if the session layer knows.
    pub src_addr: Option<Address>,
    /// Free-form marker carried through to response hooks. The device-id
    /// bootstrap sets this to 1 on its own probe so it can recognise (and
    /// swallow) the answer.
    pub oem_data: i64,
    /// The channel number the request arrived on.
    pub channel: u8,
}

impl SmiRequest {
    /// A request with no source address and no OEM marker.
    pub fn new(msg: Message, lun: LogicalUnit) -> Self {
        Self {
            msg,
            lun,
            src_addr: None,
            oem_data: 0,
            channel: 0,
        }
    }
}

/// A response as delivered back to the session layer. `data` starts with
/// the completion code.
#[derive(Debug, Clone)]
pub struct RspMsg {
    /// The response-side netfn (request netfn | 1).
    pub netfn: u8,
    /// The command the response answers.
    pub cmd: u8,
    /// Completion code followed by the response body.
    pub data: Vec<u8>,
}

/// What a response hook decided.
#[derive(Debug, Clone, Copy)]
pub struct HookAction {
    /// The hook consumed the response; it is not forwarded to the sink.
    pub consumed: bool,
    /// The hook stays installed for the next response.
    pub keep: bool,
}

/// A response hook. Vendor hooks see every response on the channel and may
/// consume the ones they understand.
pub type RspHook = Box<dyn FnMut(&mut Channel, &SmiRequest, &RspMsg) -> HookAction>;

type InstallFn = Box<dyn Fn(&mut Channel)>;

struct OemHandler {
    manufacturer_id: u32,
    product_id: u16,
    install: InstallFn,
}

/// Vendor hook installers keyed by `(manufacturer_id, product_id)`.
///
/// The registry is per-emulator: build one, share it between channels via
/// `Rc`, and each channel consults it once it has discovered who it is.
/// The first matching registration wins.
#[derive(Default)]
pub struct OemRegistry {
    handlers: Vec<OemHandler>,
}

impl OemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installer for one manufacturer/product pair. `install`
    /// runs against the channel when a matching device is discovered and
    /// typically sets a vendor response hook.
    pub fn register(
        &mut self,
        manufacturer_id: u32,
        product_id: u16,
        install: impl Fn(&mut Channel) + 'static,
    ) {
        self.handlers.push(OemHandler {
            manufacturer_id,
            product_id,
            install: Box::new(install),
        });
    }

    fn find(&self, manufacturer_id: u32, product_id: u16) -> Option<&OemHandler> {
        self.handlers
            .iter()
            .find(|h| h.manufacturer_id == manufacturer_id && h.product_id == product_id)
    }
}

type ReturnRsp = Box<dyn FnMut(&SmiRequest, &RspMsg)>;

/// One session-facing channel into the emulator.
pub struct Channel {
    channel_num: u8,
    manufacturer_id: u32,
    product_id: u16,
    oem_rsp_hook: Option<RspHook>,
    registry: Rc<OemRegistry>,
    return_rsp: Option<ReturnRsp>,
}

impl Channel {
    /// A channel with the given number, consulting `registry` for vendor
    /// hooks.
    pub fn new(channel_num: u8, registry: Rc<OemRegistry>) -> Self {
        Self {
            channel_num,
            manufacturer_id: 0,
            product_id: 0,
            oem_rsp_hook: None,
            registry,
            return_rsp: None,
        }
    }

    /// The channel number.
    pub fn channel_num(&self) -> u8 {
        self.channel_num
    }

    /// The manufacturer id discovered by the bootstrap, 0 before that.
    pub fn manufacturer_id(&self) -> u32 {
        self.manufacturer_id
    }

    /// The product id discovered by the bootstrap, 0 before that.
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Install the sink that receives responses not consumed by a hook.
    pub fn set_return_rsp(&mut self, sink: impl FnMut(&SmiRequest, &RspMsg) + 'static) {
        self.return_rsp = Some(Box::new(sink));
    }

    /// Install a response hook directly (vendor installers use this).
    pub fn set_oem_rsp_hook(&mut self, hook: RspHook) {
        self.oem_rsp_hook = Some(hook);
    }

    /// Whether a response hook is currently installed.
    pub fn has_oem_rsp_hook(&self) -> bool {
        self.oem_rsp_hook.is_some()
    }

    /// One-time channel bring-up.
    ///
    /// On channel 0, when no hook is installed yet, this installs the
    /// look-for-device-id hook and probes the engine with `Get Device ID`
    /// so the channel can discover who it is and activate a vendor hook.
    pub fn init(&mut self, emu: &mut Emulator) {
        if self.channel_num != 0 || self.oem_rsp_hook.is_some() {
            return;
        }

        self.oem_rsp_hook = Some(Box::new(look_for_device_id));

        let mut probe = SmiRequest::new(
            Message::new_request(NetFn::App, GET_DEVICE_ID_CMD, Vec::new()),
            LogicalUnit::Zero,
        );
        probe.oem_data = 1;
        probe.channel = self.channel_num;

        self.smi_send(emu, &probe);
    }

    /// Execute `req` in the emulator and route the response through the
    /// hook and on to the sink.
    pub fn smi_send(&mut self, emu: &mut Emulator, req: &SmiRequest) {
        let mut rsp = ResponseBuffer::default();
        emu.handle_msg(req.lun, &req.msg, &mut rsp);

        let rsp = RspMsg {
            netfn: req.msg.netfn_raw() | 1,
            cmd: req.msg.cmd(),
            data: rsp.take(),
        };

        self.handle_smi_rsp(req, &rsp);
    }

    /// Deliver a response: the hook sees it first and may consume it;
    /// everything else goes to the session layer's sink.
    pub fn handle_smi_rsp(&mut self, req: &SmiRequest, rsp: &RspMsg) {
        if let Some(mut hook) = self.oem_rsp_hook.take() {
            let action = hook(self, req, rsp);

            // The hook may have installed a replacement; never clobber it.
            if action.keep && self.oem_rsp_hook.is_none() {
                self.oem_rsp_hook = Some(hook);
            }

            if action.consumed {
                return;
            }
        }

        if let Some(sink) = self.return_rsp.as_mut() {
            sink(req, rsp);
        }
    }
}

/// The bootstrap hook: waits for the first successful `Get Device ID`
/// response, records the manufacturer and product ids, activates a matching
/// vendor hook from the registry, and drops itself. The response is
/// swallowed only when it answers the bootstrap's own marked probe.
fn look_for_device_id(chan: &mut Channel, req: &SmiRequest, rsp: &RspMsg) -> HookAction {
    let matches = rsp.netfn == NetFn::App.response_value()
        && rsp.cmd == GET_DEVICE_ID_CMD
        && rsp.data.len() >= 12
        && rsp.data[0] == 0;

    if !matches {
        return HookAction {
            consumed: false,
            keep: true,
        };
    }

    chan.manufacturer_id = u32::from_le_bytes([rsp.data[7], rsp.data[8], rsp.data[9], 0]);
    chan.product_id = u16::from_le_bytes([rsp.data[10], rsp.data[11]]);

    log::debug!(
        "channel {}: device is manufacturer 0x{:06X}, product 0x{:04X}",
        chan.channel_num,
        chan.manufacturer_id,
        chan.product_id
    );

    let registry = chan.registry.clone();
    if let Some(handler) = registry.find(chan.manufacturer_id, chan.product_id) {
        log::debug!("channel {}: installing vendor hook", chan.channel_num);
        (handler.install)(chan);
    }

    HookAction {
        consumed: req.oem_data != 0,
        keep: false,
    }
}
