//! Bus lifecycle: connecting to and disconnecting from the host, and routing peripheral
//! events into the enumeration core.

use log::{debug, info, trace, warn};
use spin::Once;

use driver_udc::{EndpointStatus, PinMode, PresencePin, UDCAdapter, UDCError, UdcEvent};

use crate::descriptor::ENDPOINT_DIR_IN;
use crate::device::{ConnectionState, DeviceProperty, UsbDevice};
use crate::endpoint::{self, EndpDirection};
use crate::hooks::{Hook, HookContext, HookKind, HookTable};

/// Largest packet a full-speed bulk endpoint can carry.
pub const MAX_PACKET: usize = 64;

pub struct UsbBus<T: UDCAdapter> {
    udc: T,
    device: UsbDevice,
    hooks: HookTable,
    begun: Once<()>,
}

impl<T: UDCAdapter> UsbBus<T> {
    pub fn new(udc: T, property: &'static DeviceProperty) -> Self {
        Self {
            udc,
            device: UsbDevice::new(property),
            hooks: HookTable::new(),
            begun: Once::new(),
        }
    }

    /// Presents the device to the host and starts the peripheral.
    ///
    /// Only the first call has any effect; later calls return `false`, also after a
    /// [`disable`](Self::disable). The presence pin, when the board has one, is driven
    /// low to signal the device to the host.
    pub fn enable(&mut self, pin: Option<&mut dyn PresencePin>) -> bool {
        let mut first = false;
        self.begun.call_once(|| first = true);
        if !first {
            debug!("usb: already enabled");
            return false;
        }

        if let Some(pin) = pin {
            pin.set_mode(PinMode::OutputPushPull);
            pin.write(false);
        }
        self.device.init(&mut self.udc);
        info!("usb: enabled");
        true
    }

    /// Stops interrupt delivery and releases the presence pin so the host sees a
    /// disconnect. Enumeration state is left as it was.
    pub fn disable(&mut self, pin: Option<&mut dyn PresencePin>) {
        self.udc.disable_irq();
        if let Some(pin) = pin {
            pin.write(true);
        }
        info!("usb: disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.begun.is_completed()
    }

    pub fn register_hook(&mut self, hook: Hook) -> bool {
        let kind = hook.kind();
        let replaced = self.hooks.register(hook);
        debug!("usb: registered {:?} hook (replaced: {})", kind, replaced);
        replaced
    }

    pub fn unregister_hook(&mut self, kind: HookKind) -> bool {
        self.hooks.unregister(kind)
    }

    pub fn invoke_hook(&mut self, context: HookContext<'_>) -> bool {
        self.hooks.invoke(context)
    }

    /// Services one peripheral event. Called from the peripheral's interrupt handler.
    pub fn handle_event(&mut self, event: UdcEvent) -> Result<(), UDCError> {
        match event {
            UdcEvent::Reset => {
                self.device.reset(&mut self.udc);
                Ok(())
            }
            UdcEvent::Suspend => {
                self.device.suspend();
                Ok(())
            }
            UdcEvent::Wakeup => {
                self.device.resume();
                Ok(())
            }
            UdcEvent::Setup(raw) => self.device.on_setup(&mut self.udc, &mut self.hooks, &raw),
            UdcEvent::ControlIn => self.device.on_control_in(&mut self.udc),
            UdcEvent::ControlOut => self.device.on_control_out(&mut self.udc),
            UdcEvent::EndpointOut(ep) => self.receive(ep),
            UdcEvent::EndpointIn(ep) => {
                trace!("usb: endpoint {} IN complete", ep);
                Ok(())
            }
            UdcEvent::StartOfFrame => Ok(()),
            UdcEvent::Error => {
                warn!("usb: bus error");
                Ok(())
            }
        }
    }

    /// Reads a packet from a non-control OUT endpoint, hands it to the raw-receive hook
    /// and re-arms the endpoint for the next one.
    fn receive(&mut self, ep: u8) -> Result<(), UDCError> {
        let table = self.device.property().endpoints;
        match endpoint::find(table, ep) {
            Some(entry) if !entry.is_control() && entry.direction() == EndpDirection::Out => {}
            _ => return Err(UDCError::InvalidEndpoint(ep)),
        }

        let mut buf = [0u8; MAX_PACKET];
        if let Some(len) = self.udc.read_ep(ep, &mut buf)? {
            if !self.hooks.invoke(HookContext::RawReceive(&buf[..len])) {
                trace!("usb: dropped {} bytes on endpoint {}", len, ep);
            }
        }
        self.udc.set_ep_rx_status(ep, EndpointStatus::Valid);
        Ok(())
    }

    /// Queues a packet on an IN endpoint. Fails unless the device is configured and the
    /// endpoint is not halted.
    pub fn write(&mut self, ep: u8, buf: &[u8]) -> Result<usize, UDCError> {
        if self.device.state() != ConnectionState::Configured
            || self.device.is_halted(ep | ENDPOINT_DIR_IN)
        {
            return Err(UDCError::NotReady(ep));
        }
        let count = self.udc.write_ep(ep, buf)?;
        self.udc.set_ep_tx_status(ep, EndpointStatus::Valid);
        Ok(count)
    }

    pub fn device(&self) -> &UsbDevice {
        &self.device
    }

    pub fn state(&self) -> ConnectionState {
        self.device.state()
    }

    pub fn udc(&self) -> &T {
        &self.udc
    }

    pub fn udc_mut(&mut self) -> &mut T {
        &mut self.udc
    }
}
