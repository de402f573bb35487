//! Peripheral interface consumed by the device-side USB core.
//!
//! A USB device controller (UDC) driver implements [`UDCAdapter`] on top of its
//! register block. The core only ever talks to the hardware through this trait, so the
//! same enumeration logic runs on any full-speed peripheral with per-endpoint buffer
//! descriptors and independent RX/TX status fields.

use bitflags::bitflags;
use thiserror::Error;

#[cfg(feature = "mock")]
pub mod mock;

/// Number of endpoint register pairs a full-speed peripheral exposes.
pub const MAX_ENDPOINTS: usize = 8;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum UDCError {
    #[error("endpoint {0} does not exist on this peripheral")]
    InvalidEndpoint(u8),

    #[error("packet of {len} bytes does not fit endpoint {ep} (max {max})")]
    PacketTooLarge { ep: u8, len: usize, max: usize },

    #[error("endpoint {0} is not ready")]
    NotReady(u8),
}

pub type Result<T, E = UDCError> = std::result::Result<T, E>;

/// Transfer type of an endpoint.
///
/// The discriminants are the `bmAttributes` transfer type encoding of an endpoint
/// descriptor; adapters translate them into their own register encoding.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpointKind {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// Handshake state of one direction of an endpoint.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpointStatus {
    Disabled,
    Stall,
    Nak,
    Valid,
}

impl Default for EndpointStatus {
    fn default() -> Self {
        Self::Disabled
    }
}

bitflags! {
    /// Interrupt causes the peripheral may raise.
    pub struct IrqMask: u16 {
        /// Correct transfer on any endpoint
        const CTR = 1 << 15;
        const PMAOVR = 1 << 14;
        const ERR = 1 << 13;
        const WKUP = 1 << 12;
        const SUSP = 1 << 11;
        const RESET = 1 << 10;
        const SOF = 1 << 9;
        const ESOF = 1 << 8;

        /// The causes the enumeration core services once the bus is up.
        const SERVICED = Self::CTR.bits
            | Self::WKUP.bits
            | Self::SUSP.bits
            | Self::ERR.bits
            | Self::SOF.bits
            | Self::ESOF.bits
            | Self::RESET.bits;
    }
}

/// An interrupt cause, already decoded by the adapter's IRQ handler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UdcEvent {
    Reset,
    Suspend,
    Wakeup,
    /// A SETUP packet arrived on endpoint 0.
    Setup([u8; 8]),
    /// An IN packet on endpoint 0 was acknowledged by the host.
    ControlIn,
    /// An OUT packet that is not a SETUP arrived on endpoint 0.
    ControlOut,
    /// An OUT packet arrived on a non-control endpoint.
    EndpointOut(u8),
    /// An IN packet on a non-control endpoint was acknowledged by the host.
    EndpointIn(u8),
    StartOfFrame,
    Error,
}

pub trait UDCAdapter {
    /// Copies `buf` into the endpoint's transmit buffer and sets the byte count. The
    /// caller marks the endpoint valid afterwards.
    fn write_ep(&mut self, ep: u8, buf: &[u8]) -> Result<usize>;

    /// Copies the last received packet of `ep` into `buf`, returning `None` when
    /// nothing is pending.
    fn read_ep(&mut self, ep: u8, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Holds the peripheral in reset (`CNTR.FRES`).
    fn force_reset(&mut self);
    fn set_irq_mask(&mut self, mask: IrqMask);
    fn clear_interrupts(&mut self);

    /// Unmasks the peripheral's line in the interrupt controller.
    fn enable_irq(&mut self);
    fn disable_irq(&mut self);

    /// Base of the buffer descriptor table in packet memory.
    fn set_btable(&mut self, addr: u16);
    fn set_device_address(&mut self, address: u8);

    fn set_ep_type(&mut self, ep: u8, kind: EndpointKind);
    fn set_ep_rx_addr(&mut self, ep: u8, addr: u16);
    fn set_ep_tx_addr(&mut self, ep: u8, addr: u16);
    fn set_ep_rx_count(&mut self, ep: u8, count: u16);
    fn set_ep_rx_status(&mut self, ep: u8, status: EndpointStatus);
    fn set_ep_tx_status(&mut self, ep: u8, status: EndpointStatus);

    /// Clears the control endpoint's STATUS_OUT bit so OUT packets of any length are
    /// accepted.
    fn clear_status_out(&mut self, ep: u8);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PinMode {
    OutputPushPull,
    OutputOpenDrain,
    InputFloating,
}

/// GPIO that gates the D+ pull-up on boards without a built-in one.
pub trait PresencePin {
    fn set_mode(&mut self, mode: PinMode);
    fn write(&mut self, level: bool);
}
