//! The enumeration state machine.
//!
//! [`UsbDevice`] answers every control transfer on endpoint 0 and owns the device's
//! [`ConnectionState`]. Device-specific knowledge (descriptors, interface layout, class
//! requests, endpoints) comes from the [`DeviceProperty`] it is constructed with.

use log::{debug, info, trace};
use smallvec::SmallVec;

use driver_udc::{EndpointStatus, IrqMask, UDCAdapter, UDCError};

use crate::class::{ClassRequestTable, DataOutHandler, DataStage};
use crate::descriptor::{DescriptorKind, CONFIG_ATTR_REMOTE_WAKEUP, CONFIG_ATTR_SELF_POWERED};
use crate::endpoint::{self, EndpDirection, EndpointEntry};
use crate::hooks::{HookContext, HookTable};
use crate::setup::{
    ReqDirection, ReqRecipient, ReqType, Setup, SetupReq, FEATURE_DEVICE_REMOTE_WAKEUP,
    FEATURE_ENDPOINT_HALT,
};
use crate::{ControlData, RequestError};

/// Highest number of interfaces whose alternate setting is tracked.
pub const MAX_INTERFACES: usize = 8;

/// Packet memory offset of the buffer descriptor table.
pub const BTABLE_ADDRESS: u16 = 0x00;

const CONTROL_EP: u8 = 0;

/// Returns the descriptor clamped to the requested length, or `None` if it does not
/// exist.
pub type DescriptorGetter = fn(u16) -> Option<&'static [u8]>;
/// As [`DescriptorGetter`], selecting a string by its index.
pub type StringDescriptorGetter = fn(u8, u16) -> Option<&'static [u8]>;
/// Accepts an (interface, alternate setting) pair the device implements.
pub type InterfaceSettingCheck = fn(u8, u8) -> Result<(), RequestError>;

/// Everything the enumeration core needs to know about a concrete device.
pub struct DeviceProperty {
    /// bMaxPacketSize0
    pub max_packet_size: u16,
    pub total_configurations: u8,
    /// bmAttributes of the configuration; reported through GET_STATUS.
    pub config_attributes: u8,
    pub endpoints: &'static [EndpointEntry],
    pub get_device_descriptor: DescriptorGetter,
    pub get_config_descriptor: DescriptorGetter,
    pub get_string_descriptor: StringDescriptorGetter,
    pub get_interface_setting: InterfaceSettingCheck,
    pub class_requests: ClassRequestTable,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConnectionState {
    Unconnected,
    Attached,
    Addressed,
    Configured,
}

enum ControlStage {
    Idle,
    DataIn {
        data: ControlData,
        len: usize,
        offset: usize,
        zlp: bool,
    },
    DataOut {
        setup: Setup,
        handler: DataOutHandler,
        data: SmallVec<[u8; 64]>,
    },
    /// The device sent the zero-length status packet and waits for the host's ACK.
    StatusIn,
    /// The host owes the zero-length status packet.
    StatusOut,
}

enum Reply {
    Data(ControlData),
    Receive(DataOutHandler),
    Status,
}

pub struct UsbDevice {
    property: &'static DeviceProperty,
    state: ConnectionState,
    suspended: bool,
    current_configuration: u8,
    current_feature: u8,
    remote_wakeup: bool,
    address: u8,
    pending_address: Option<u8>,
    alternate_settings: [u8; MAX_INTERFACES],
    /// Halt flags, bit n for OUT endpoint n and bit 16 + n for IN endpoint n.
    halted: u32,
    stage: ControlStage,
}

impl UsbDevice {
    pub fn new(property: &'static DeviceProperty) -> Self {
        Self {
            property,
            state: ConnectionState::Unconnected,
            suspended: false,
            current_configuration: 0,
            current_feature: property.config_attributes,
            remote_wakeup: false,
            address: 0,
            pending_address: None,
            alternate_settings: [0; MAX_INTERFACES],
            halted: 0,
            stage: ControlStage::Idle,
        }
    }

    pub fn property(&self) -> &'static DeviceProperty {
        self.property
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn current_configuration(&self) -> u8 {
        self.current_configuration
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn alternate_setting(&self, interface: u8) -> Option<u8> {
        self.alternate_settings.get(usize::from(interface)).copied()
    }

    pub fn remote_wakeup_enabled(&self) -> bool {
        self.remote_wakeup
    }

    /// Whether the endpoint at `address` (direction bit included) is halted.
    pub fn is_halted(&self, address: u8) -> bool {
        self.halted & halt_flag(address & 0x0F, address & 0x80 != 0) != 0
    }

    /// Whether a control transfer is between its SETUP and its status stage.
    pub fn control_in_progress(&self) -> bool {
        !matches!(self.stage, ControlStage::Idle)
    }

    /// Brings the peripheral out of reset and unmasks the interrupts the core services.
    pub fn init<T: UDCAdapter>(&mut self, udc: &mut T) {
        self.current_configuration = 0;

        udc.force_reset();
        udc.set_irq_mask(IrqMask::empty());
        udc.clear_interrupts();
        udc.set_irq_mask(IrqMask::RESET | IrqMask::SUSP | IrqMask::WKUP);
        udc.clear_interrupts();
        udc.set_irq_mask(IrqMask::SERVICED);
        udc.enable_irq();

        self.state = ConnectionState::Unconnected;
        debug!("usb: peripheral initialized");
    }

    /// Bus reset: discards any transfer in flight and returns to the default state.
    pub fn reset<T: UDCAdapter>(&mut self, udc: &mut T) {
        if self.control_in_progress() {
            debug!("usb: reset aborted a control transfer");
        }

        self.current_configuration = 0;
        self.current_feature = self.property.config_attributes;
        self.remote_wakeup = false;
        self.pending_address = None;
        self.alternate_settings = [0; MAX_INTERFACES];
        self.halted = 0;
        self.suspended = false;
        self.stage = ControlStage::Idle;

        udc.set_btable(BTABLE_ADDRESS);
        endpoint::activate(udc, self.property.endpoints, self.property.max_packet_size);

        self.state = ConnectionState::Attached;
        self.address = 0;
        udc.set_device_address(0);
        info!("usb: bus reset, attached");
    }

    pub fn suspend(&mut self) {
        if !self.suspended {
            debug!("usb: suspended in state {:?}", self.state);
        }
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        if self.suspended {
            debug!("usb: woken up in state {:?}", self.state);
        }
        self.suspended = false;
    }

    /// Handles a SETUP packet. Requests the device does not support are answered with a
    /// STALL; only peripheral failures are returned.
    pub fn on_setup<T: UDCAdapter>(
        &mut self,
        udc: &mut T,
        hooks: &mut HookTable,
        raw: &[u8],
    ) -> Result<(), UDCError> {
        if self.control_in_progress() {
            trace!("usb: SETUP aborted the previous control transfer");
        }
        self.stage = ControlStage::Idle;
        // A SETUP clears any stall on endpoint 0; both directions NAK until answered.
        udc.set_ep_tx_status(CONTROL_EP, EndpointStatus::Nak);
        udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Nak);

        let setup = match Setup::from_bytes(raw) {
            Ok(setup) => setup,
            Err(_) => {
                debug!("usb: stalling malformed SETUP of {} bytes", raw.len());
                self.stall(udc);
                return Ok(());
            }
        };
        trace!("usb: {:X?}", setup);

        match self.dispatch(udc, hooks, &setup) {
            Ok(Reply::Data(data)) => self.start_data_in(udc, &setup, data),
            Ok(Reply::Receive(handler)) => {
                self.stage = ControlStage::DataOut {
                    setup,
                    handler,
                    data: SmallVec::new(),
                };
                udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
                Ok(())
            }
            Ok(Reply::Status) => self.start_status_in(udc),
            Err(RequestError::Udc(err)) => Err(err),
            Err(err) => {
                debug!("usb: stalling {:X?}: {}", setup, err);
                self.stall(udc);
                Ok(())
            }
        }
    }

    /// The host acknowledged an IN packet on endpoint 0.
    pub fn on_control_in<T: UDCAdapter>(&mut self, udc: &mut T) -> Result<(), UDCError> {
        match self.stage {
            ControlStage::DataIn { .. } => self.send_next(udc),
            ControlStage::StatusIn => {
                self.stage = ControlStage::Idle;
                if let Some(address) = self.pending_address.take() {
                    self.apply_address(udc, address);
                }
                udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A non-SETUP OUT packet arrived on endpoint 0.
    pub fn on_control_out<T: UDCAdapter>(&mut self, udc: &mut T) -> Result<(), UDCError> {
        let mut buf = [0u8; 64];
        let len = udc.read_ep(CONTROL_EP, &mut buf)?.unwrap_or(0);
        let packet_size = usize::from(self.property.max_packet_size);

        match std::mem::replace(&mut self.stage, ControlStage::Idle) {
            ControlStage::DataOut {
                setup,
                handler,
                mut data,
            } => {
                let expected = usize::from(setup.length);
                let take = len.min(expected - data.len());
                data.extend_from_slice(&buf[..take]);

                if data.len() < expected && len == packet_size {
                    self.stage = ControlStage::DataOut {
                        setup,
                        handler,
                        data,
                    };
                    udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
                    return Ok(());
                }

                match handler(&setup, &data) {
                    Ok(()) => self.start_status_in(udc),
                    Err(RequestError::Udc(err)) => Err(err),
                    Err(err) => {
                        debug!("usb: stalling data stage of {:X?}: {}", setup, err);
                        self.stall(udc);
                        Ok(())
                    }
                }
            }
            // Status stage of an IN transfer; the host may also end the data stage early.
            ControlStage::StatusOut | ControlStage::DataIn { .. } => {
                udc.set_ep_tx_status(CONTROL_EP, EndpointStatus::Stall);
                udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
                Ok(())
            }
            other => {
                self.stage = other;
                udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
                Ok(())
            }
        }
    }

    fn dispatch<T: UDCAdapter>(
        &mut self,
        udc: &mut T,
        hooks: &mut HookTable,
        setup: &Setup,
    ) -> Result<Reply, RequestError> {
        if setup.req_ty() == ReqType::Standard as u8 {
            return self.standard_request(udc, hooks, setup);
        }
        if !setup.is_class_interface() {
            return Err(RequestError::Unsupported);
        }

        let table = &self.property.class_requests;
        if setup.length == 0 {
            table.no_data_setup(setup)?;
            Ok(Reply::Status)
        } else {
            Ok(match table.data_setup(setup)? {
                DataStage::In(data) => Reply::Data(data),
                DataStage::Out(handler) => Reply::Receive(handler),
            })
        }
    }

    fn standard_request<T: UDCAdapter>(
        &mut self,
        udc: &mut T,
        hooks: &mut HookTable,
        setup: &Setup,
    ) -> Result<Reply, RequestError> {
        let request = SetupReq::from_u8(setup.request).ok_or(RequestError::Unsupported)?;
        let expected = match request {
            SetupReq::GetStatus
            | SetupReq::GetDescriptor
            | SetupReq::GetConfiguration
            | SetupReq::GetInterface
            | SetupReq::SynchFrame => ReqDirection::DeviceToHost,
            _ => ReqDirection::HostToDevice,
        };
        if setup.direction() != expected {
            return Err(RequestError::Unsupported);
        }

        match request {
            SetupReq::GetStatus => self.get_status(setup).map(Reply::Data),
            SetupReq::ClearFeature => self.feature(udc, setup, false).map(|_| Reply::Status),
            SetupReq::SetFeature => self.feature(udc, setup, true).map(|_| Reply::Status),
            SetupReq::SetAddress => self.set_address(setup).map(|_| Reply::Status),
            SetupReq::GetDescriptor => self.get_descriptor(setup).map(Reply::Data),
            SetupReq::GetConfiguration => {
                Ok(Reply::Data(ControlData::inline(&[self.current_configuration])))
            }
            SetupReq::SetConfiguration => {
                self.set_configuration(udc, setup).map(|_| Reply::Status)
            }
            SetupReq::GetInterface => self.get_interface(setup).map(Reply::Data),
            SetupReq::SetInterface => self.set_interface(hooks, setup).map(|_| Reply::Status),
            SetupReq::SetDescriptor | SetupReq::SynchFrame => Err(RequestError::Unsupported),
        }
    }

    fn get_descriptor(&self, setup: &Setup) -> Result<ControlData, RequestError> {
        let length = setup.length;
        let data = match DescriptorKind::from_u8(setup.value_high()) {
            Some(DescriptorKind::Device) => (self.property.get_device_descriptor)(length),
            Some(DescriptorKind::Configuration) => (self.property.get_config_descriptor)(length),
            Some(DescriptorKind::String) => {
                (self.property.get_string_descriptor)(setup.value_low(), length)
            }
            _ => None,
        };
        data.map(ControlData::Static)
            .ok_or(RequestError::Unsupported)
    }

    fn set_address(&mut self, setup: &Setup) -> Result<(), RequestError> {
        let address = setup.value;
        if setup.req_recipient() != ReqRecipient::Device as u8
            || address > 127
            || setup.index != 0
            || self.state == ConnectionState::Configured
        {
            return Err(RequestError::Unsupported);
        }
        // Takes effect once the status stage completes.
        self.pending_address = Some(address as u8);
        Ok(())
    }

    fn apply_address<T: UDCAdapter>(&mut self, udc: &mut T, address: u8) {
        udc.set_device_address(address);
        self.address = address;
        self.state = if address == 0 {
            ConnectionState::Attached
        } else {
            ConnectionState::Addressed
        };
        info!("usb: address {}, {:?}", address, self.state);
    }

    fn set_configuration<T: UDCAdapter>(
        &mut self,
        udc: &mut T,
        setup: &Setup,
    ) -> Result<(), RequestError> {
        let value = setup.value;
        if setup.req_recipient() != ReqRecipient::Device as u8
            || value > u16::from(self.property.total_configurations)
        {
            return Err(RequestError::Unsupported);
        }
        match self.state {
            ConnectionState::Addressed | ConnectionState::Configured => {}
            _ => return Err(RequestError::Unsupported),
        }

        self.current_configuration = value as u8;
        self.alternate_settings = [0; MAX_INTERFACES];
        self.clear_halts(udc);
        self.state = if self.current_configuration != 0 {
            ConnectionState::Configured
        } else {
            ConnectionState::Addressed
        };
        info!(
            "usb: configuration {}, {:?}",
            self.current_configuration, self.state
        );
        Ok(())
    }

    /// Re-arms every halted endpoint of the table.
    fn clear_halts<T: UDCAdapter>(&mut self, udc: &mut T) {
        for entry in self.property.endpoints.iter().filter(|e| !e.is_control()) {
            let number = entry.number;
            if self.halted & halt_flag(number, true) != 0 {
                udc.set_ep_tx_status(number, EndpointStatus::Nak);
            }
            if self.halted & halt_flag(number, false) != 0 {
                udc.set_ep_rx_status(number, EndpointStatus::Valid);
            }
        }
        self.halted = 0;
    }

    fn checked_interface(&self, setup: &Setup, alternate_setting: u8) -> Result<u8, RequestError> {
        if setup.req_recipient() != ReqRecipient::Interface as u8
            || self.state != ConnectionState::Configured
            || setup.index > u16::from(u8::MAX)
        {
            return Err(RequestError::Unsupported);
        }
        let interface = setup.index as u8;
        (self.property.get_interface_setting)(interface, alternate_setting)?;
        if usize::from(interface) >= MAX_INTERFACES {
            return Err(RequestError::Unsupported);
        }
        Ok(interface)
    }

    fn get_interface(&self, setup: &Setup) -> Result<ControlData, RequestError> {
        let interface = self.checked_interface(setup, 0)?;
        let alternate_setting = self.alternate_settings[usize::from(interface)];
        Ok(ControlData::inline(&[alternate_setting]))
    }

    fn set_interface(&mut self, hooks: &mut HookTable, setup: &Setup) -> Result<(), RequestError> {
        if setup.value > u16::from(u8::MAX) {
            return Err(RequestError::Unsupported);
        }
        let alternate_setting = setup.value as u8;
        let interface = self.checked_interface(setup, alternate_setting)?;
        self.alternate_settings[usize::from(interface)] = alternate_setting;
        debug!(
            "usb: interface {} alternate setting {}",
            interface, alternate_setting
        );
        hooks.invoke(HookContext::InterfaceSetup {
            interface,
            alternate_setting,
        });
        Ok(())
    }

    fn get_status(&self, setup: &Setup) -> Result<ControlData, RequestError> {
        let status: u16 = match setup.req_recipient() {
            r if r == ReqRecipient::Device as u8 => {
                let mut status = 0;
                if self.current_feature & CONFIG_ATTR_SELF_POWERED != 0 {
                    status |= 1 << 0;
                }
                if self.remote_wakeup {
                    status |= 1 << 1;
                }
                status
            }
            r if r == ReqRecipient::Interface as u8 => {
                self.checked_interface(setup, 0)?;
                0
            }
            r if r == ReqRecipient::Endpoint as u8 => {
                let bit = self.halt_bit(setup.index)?;
                u16::from(self.halted & bit != 0)
            }
            _ => return Err(RequestError::Unsupported),
        };
        Ok(ControlData::inline(&status.to_le_bytes()))
    }

    fn feature<T: UDCAdapter>(
        &mut self,
        udc: &mut T,
        setup: &Setup,
        set: bool,
    ) -> Result<(), RequestError> {
        match (setup.req_recipient(), setup.value) {
            (r, FEATURE_DEVICE_REMOTE_WAKEUP) if r == ReqRecipient::Device as u8 => {
                if self.current_feature & CONFIG_ATTR_REMOTE_WAKEUP == 0 {
                    return Err(RequestError::Unsupported);
                }
                self.remote_wakeup = set;
                Ok(())
            }
            (r, FEATURE_ENDPOINT_HALT) if r == ReqRecipient::Endpoint as u8 => {
                let number = (setup.index & 0x0F) as u8;
                if number == CONTROL_EP {
                    // Endpoint 0 clears its own stall with the next SETUP.
                    return if set {
                        Err(RequestError::Unsupported)
                    } else {
                        Ok(())
                    };
                }
                let bit = self.halt_bit(setup.index)?;
                let is_in = setup.index & 0x80 != 0;
                if set {
                    self.halted |= bit;
                    if is_in {
                        udc.set_ep_tx_status(number, EndpointStatus::Stall);
                    } else {
                        udc.set_ep_rx_status(number, EndpointStatus::Stall);
                    }
                } else {
                    self.halted &= !bit;
                    if is_in {
                        udc.set_ep_tx_status(number, EndpointStatus::Nak);
                    } else {
                        udc.set_ep_rx_status(number, EndpointStatus::Valid);
                    }
                }
                debug!("usb: endpoint {:#04x} halt {}", { setup.index }, set);
                Ok(())
            }
            _ => Err(RequestError::Unsupported),
        }
    }

    /// Maps a wIndex endpoint address to its halt flag, rejecting endpoints that do not
    /// exist or are not usable in the current state.
    fn halt_bit(&self, index: u16) -> Result<u32, RequestError> {
        let number = (index & 0x0F) as u8;
        let is_in = index & 0x80 != 0;
        if index & !0x8F != 0 {
            return Err(RequestError::Unsupported);
        }
        if number != CONTROL_EP {
            if self.state != ConnectionState::Configured {
                return Err(RequestError::Unsupported);
            }
            let entry = endpoint::find(self.property.endpoints, number)
                .ok_or(RequestError::Unsupported)?;
            let direction_ok = match entry.direction() {
                EndpDirection::In => is_in,
                EndpDirection::Out => !is_in,
                EndpDirection::Bidirectional => true,
            };
            if !direction_ok {
                return Err(RequestError::Unsupported);
            }
        }
        Ok(halt_flag(number, is_in))
    }

    fn start_data_in<T: UDCAdapter>(
        &mut self,
        udc: &mut T,
        setup: &Setup,
        data: ControlData,
    ) -> Result<(), UDCError> {
        let requested = usize::from(setup.length);
        if requested == 0 {
            return self.start_status_in(udc);
        }

        let packet_size = usize::from(self.property.max_packet_size);
        let len = data.len().min(requested);
        // A reply shorter than requested that ends on a packet boundary needs a
        // zero-length packet to terminate the data stage.
        let zlp = len < requested && len % packet_size == 0;
        self.stage = ControlStage::DataIn {
            data,
            len,
            offset: 0,
            zlp,
        };
        self.send_next(udc)
    }

    fn send_next<T: UDCAdapter>(&mut self, udc: &mut T) -> Result<(), UDCError> {
        let packet_size = usize::from(self.property.max_packet_size);
        let ControlStage::DataIn {
            data,
            len,
            offset,
            zlp,
        } = &mut self.stage
        else {
            return Ok(());
        };

        if *offset < *len {
            let end = (*offset + packet_size).min(*len);
            udc.write_ep(CONTROL_EP, &data.as_slice()[*offset..end])?;
            *offset = end;
        } else if *zlp {
            udc.write_ep(CONTROL_EP, &[])?;
            *zlp = false;
        } else {
            self.stage = ControlStage::StatusOut;
            udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
            return Ok(());
        }

        udc.set_ep_tx_status(CONTROL_EP, EndpointStatus::Valid);
        udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Valid);
        Ok(())
    }

    fn start_status_in<T: UDCAdapter>(&mut self, udc: &mut T) -> Result<(), UDCError> {
        udc.write_ep(CONTROL_EP, &[])?;
        udc.set_ep_tx_status(CONTROL_EP, EndpointStatus::Valid);
        self.stage = ControlStage::StatusIn;
        Ok(())
    }

    fn stall<T: UDCAdapter>(&mut self, udc: &mut T) {
        self.stage = ControlStage::Idle;
        udc.set_ep_tx_status(CONTROL_EP, EndpointStatus::Stall);
        udc.set_ep_rx_status(CONTROL_EP, EndpointStatus::Stall);
    }
}

const fn halt_flag(number: u8, is_in: bool) -> u32 {
    if is_in {
        1 << (16 + number as u32)
    } else {
        1 << number as u32
    }
}
