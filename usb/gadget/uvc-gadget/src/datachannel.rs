//! Auxiliary serial data channel sharing the camera's USB connection.
//!
//! The channel owns no protocol state. It brings the bus up once and registers the
//! callbacks its user supplied with the bus's hook table.

use log::{debug, info};

use driver_gadget::hooks::{InterfaceSetupHook, RawReceiveHook};
use driver_gadget::{ConnectionState, Hook, UsbBus};
use driver_udc::{PresencePin, UDCAdapter, UDCError};

use crate::device::{BULK_PACKET_SIZE, TX_ENDPOINT};

#[derive(Default)]
pub struct DataChannel {
    on_receive: Option<RawReceiveHook>,
    on_interface_setup: Option<InterfaceSetupHook>,
}

impl DataChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with every packet the host sends to the receive endpoint.
    pub fn on_receive(mut self, f: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.on_receive = Some(Box::new(f));
        self
    }

    /// Called with (interface, alternate setting) after every SET_INTERFACE.
    pub fn on_interface_setup(mut self, f: impl FnMut(u8, u8) + Send + 'static) -> Self {
        self.on_interface_setup = Some(Box::new(f));
        self
    }

    /// Registers the callbacks and enables the bus. The bus is enabled at most once per
    /// lifetime; returns whether this call enabled it.
    pub fn begin<T: UDCAdapter>(
        &mut self,
        bus: &mut UsbBus<T>,
        pin: Option<&mut dyn PresencePin>,
    ) -> bool {
        if let Some(f) = self.on_receive.take() {
            bus.register_hook(Hook::RawReceive(f));
        }
        if let Some(f) = self.on_interface_setup.take() {
            bus.register_hook(Hook::InterfaceSetup(f));
        }

        let enabled = bus.enable(pin);
        if enabled {
            info!("datachannel: started");
        } else {
            debug!("datachannel: bus already enabled");
        }
        enabled
    }

    /// Disconnects from the host.
    pub fn end<T: UDCAdapter>(&mut self, bus: &mut UsbBus<T>, pin: Option<&mut dyn PresencePin>) {
        bus.disable(pin);
    }

    /// Whether the host has configured the device, so writes can reach it.
    pub fn is_connected<T: UDCAdapter>(bus: &UsbBus<T>) -> bool {
        bus.state() == ConnectionState::Configured && !bus.device().is_suspended()
    }

    /// Queues up to one packet of `buf` on the transmit endpoint and returns how many
    /// bytes were taken.
    pub fn write<T: UDCAdapter>(bus: &mut UsbBus<T>, buf: &[u8]) -> Result<usize, UDCError> {
        let len = buf.len().min(usize::from(BULK_PACKET_SIZE));
        bus.write(TX_ENDPOINT, &buf[..len])
    }
}
