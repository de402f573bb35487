//! Device-side USB core: descriptor model, endpoint table, enumeration state machine,
//! class hook registry and the bus lifecycle controller.
//!
//! A device function describes itself with a static [`DeviceProperty`] and hands it to a
//! [`UsbBus`] together with the peripheral's [`driver_udc::UDCAdapter`]. The
//! peripheral's interrupt handler then feeds decoded [`driver_udc::UdcEvent`]s into
//! [`UsbBus::handle_event`]; everything else (standard requests, descriptor replies,
//! endpoint setup after reset, STALLs) is handled here.

use smallvec::SmallVec;
use thiserror::Error;

use driver_udc::UDCError;

pub mod bus;
pub mod class;
pub mod descriptor;
pub mod device;
pub mod endpoint;
pub mod hooks;
pub mod setup;

pub use self::bus::UsbBus;
pub use self::class::{ClassHandler, ClassRequest, ClassRequestTable};
pub use self::device::{ConnectionState, DeviceProperty, UsbDevice};
pub use self::endpoint::{EndpDirection, EndpointEntry, EndpointRole};
pub use self::hooks::{Hook, HookContext, HookKind, HookTable};
pub use self::setup::{ReqDirection, ReqRecipient, ReqType, Setup, SetupReq};

#[derive(Debug, Error)]
pub enum RequestError {
    /// The request is not implemented by this device, or names an interface, alternate
    /// setting, endpoint or descriptor it does not have. Answered with a STALL.
    #[error("unsupported request")]
    Unsupported,

    #[error("malformed setup packet")]
    Malformed,

    #[error("peripheral error: {0}")]
    Udc(#[from] UDCError),
}

/// Payload of a device-to-host data stage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlData {
    /// A slice of a static descriptor table.
    Static(&'static [u8]),
    /// A short computed reply such as GET_STATUS.
    Inline(SmallVec<[u8; 4]>),
}

impl ControlData {
    pub fn inline(bytes: &[u8]) -> Self {
        Self::Inline(SmallVec::from_slice(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Static(bytes) => bytes,
            Self::Inline(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
