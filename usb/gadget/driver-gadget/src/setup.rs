use crate::descriptor::DescriptorKind;
use crate::RequestError;

/// The 8-byte SETUP packet that opens every control transfer (USB2 9.3).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Setup {
    pub kind: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

unsafe impl plain::Plain for Setup {}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqType {
    /// Requests defined by chapter 9, answered by the enumeration core itself.
    Standard = 0,

    /// Requests defined by a device class specification.
    Class = 1,

    Vendor = 2,

    /// Reserved
    Reserved = 3,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReqRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
    // 4..=30 are reserved
    VendorSpecific = 31,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetupReq {
    GetStatus = 0x00,
    ClearFeature = 0x01,
    SetFeature = 0x03,
    SetAddress = 0x05,
    GetDescriptor = 0x06,
    SetDescriptor = 0x07,
    GetConfiguration = 0x08,
    SetConfiguration = 0x09,
    GetInterface = 0x0A,
    SetInterface = 0x0B,
    SynchFrame = 0x0C,
}

impl SetupReq {
    pub fn from_u8(request: u8) -> Option<Self> {
        Some(match request {
            0x00 => Self::GetStatus,
            0x01 => Self::ClearFeature,
            0x03 => Self::SetFeature,
            0x05 => Self::SetAddress,
            0x06 => Self::GetDescriptor,
            0x07 => Self::SetDescriptor,
            0x08 => Self::GetConfiguration,
            0x09 => Self::SetConfiguration,
            0x0A => Self::GetInterface,
            0x0B => Self::SetInterface,
            0x0C => Self::SynchFrame,
            _ => return None,
        })
    }
}

/// Feature selectors for SET_FEATURE/CLEAR_FEATURE (USB2 Table 9-6).
pub const FEATURE_ENDPOINT_HALT: u16 = 0;
pub const FEATURE_DEVICE_REMOTE_WAKEUP: u16 = 1;

pub const USB_SETUP_DIR_BIT: u8 = 1 << 7;
pub const USB_SETUP_DIR_SHIFT: u8 = 7;
pub const USB_SETUP_REQ_TY_MASK: u8 = 0x60;
pub const USB_SETUP_REQ_TY_SHIFT: u8 = 5;
pub const USB_SETUP_RECIPIENT_MASK: u8 = 0x1F;
pub const USB_SETUP_RECIPIENT_SHIFT: u8 = 0;

impl Setup {
    /// Decodes a SETUP packet as it sits in the control endpoint's receive buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RequestError> {
        let raw = plain::from_bytes::<Setup>(bytes).map_err(|_| RequestError::Malformed)?;
        Ok(Self {
            kind: raw.kind,
            request: raw.request,
            value: u16::from_le(raw.value),
            index: u16::from_le(raw.index),
            length: u16::from_le(raw.length),
        })
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.kind,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    pub fn direction(&self) -> ReqDirection {
        if self.kind & USB_SETUP_DIR_BIT == 0 {
            ReqDirection::HostToDevice
        } else {
            ReqDirection::DeviceToHost
        }
    }

    pub const fn req_ty(&self) -> u8 {
        (self.kind & USB_SETUP_REQ_TY_MASK) >> USB_SETUP_REQ_TY_SHIFT
    }

    pub const fn req_recipient(&self) -> u8 {
        (self.kind & USB_SETUP_RECIPIENT_MASK) >> USB_SETUP_RECIPIENT_SHIFT
    }

    pub fn is_class_interface(&self) -> bool {
        self.req_ty() == ReqType::Class as u8 && self.req_recipient() == ReqRecipient::Interface as u8
    }

    /// High byte of wValue, the descriptor type of a GET_DESCRIPTOR.
    pub const fn value_high(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Low byte of wValue, the descriptor index of a GET_DESCRIPTOR.
    pub const fn value_low(&self) -> u8 {
        self.value as u8
    }

    pub const fn get_status() -> Self {
        Self {
            kind: 0b1000_0000,
            request: 0x00,
            value: 0,
            index: 0,
            length: 2,
        }
    }

    pub const fn clear_feature(feature: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x01,
            value: feature,
            index: 0,
            length: 0,
        }
    }

    pub const fn set_feature(feature: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x03,
            value: feature,
            index: 0,
            length: 0,
        }
    }

    pub const fn set_address(address: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x05,
            value: address,
            index: 0,
            length: 0,
        }
    }

    pub const fn get_descriptor(
        kind: DescriptorKind,
        index: u8,
        language: u16,
        length: u16,
    ) -> Self {
        Self {
            kind: 0b1000_0000,
            request: 0x06,
            value: ((kind as u16) << 8) | (index as u16),
            index: language,
            length,
        }
    }

    pub const fn get_configuration() -> Self {
        Self {
            kind: 0b1000_0000,
            request: 0x08,
            value: 0,
            index: 0,
            length: 1,
        }
    }

    pub const fn set_configuration(value: u8) -> Self {
        Self {
            kind: 0b0000_0000,
            request: 0x09,
            value: value as u16,
            index: 0,
            length: 0,
        }
    }

    pub const fn get_interface(interface: u8) -> Self {
        Self {
            kind: 0b1000_0001,
            request: 0x0A,
            value: 0,
            index: interface as u16,
            length: 1,
        }
    }

    pub const fn set_interface(interface: u8, alternate_setting: u8) -> Self {
        Self {
            kind: 0b0000_0001,
            request: 0x0B,
            value: alternate_setting as u16,
            index: interface as u16,
            length: 0,
        }
    }

    /// A class request addressed to an interface.
    pub const fn class_interface(
        direction: ReqDirection,
        request: u8,
        value: u16,
        interface: u8,
        length: u16,
    ) -> Self {
        Self {
            kind: ((direction as u8) << USB_SETUP_DIR_SHIFT)
                | ((ReqType::Class as u8) << USB_SETUP_REQ_TY_SHIFT)
                | ReqRecipient::Interface as u8,
            request,
            value,
            index: interface as u16,
            length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_size() {
        assert_eq!(core::mem::size_of::<Setup>(), 8);
    }

    #[test]
    fn decode_get_descriptor() {
        let setup = Setup::from_bytes(&[0x80, 0x06, 0x03, 0x03, 0x09, 0x04, 0xFF, 0x00]).unwrap();
        assert_eq!(setup.direction(), ReqDirection::DeviceToHost);
        assert_eq!(setup.req_ty(), ReqType::Standard as u8);
        assert_eq!(setup.req_recipient(), ReqRecipient::Device as u8);
        assert_eq!(SetupReq::from_u8(setup.request), Some(SetupReq::GetDescriptor));
        assert_eq!(setup.value_high(), DescriptorKind::String as u8);
        assert_eq!(setup.value_low(), 3);
        assert_eq!({ setup.index }, 0x0409);
        assert_eq!({ setup.length }, 0xFF);
    }

    #[test]
    fn short_packet_is_malformed() {
        assert!(matches!(
            Setup::from_bytes(&[0x80, 0x06, 0x00]),
            Err(RequestError::Malformed)
        ));
    }

    #[test]
    fn class_request_kind() {
        let setup = Setup::class_interface(ReqDirection::DeviceToHost, 0x81, 0x0100, 1, 26);
        assert_eq!({ setup.kind }, 0xA1);
        assert!(setup.is_class_interface());
        assert_eq!(Setup::from_bytes(&setup.to_bytes()).unwrap(), setup);
    }
}
