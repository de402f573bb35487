use driver_udc::EndpointKind;

use super::{DescriptorKind, DescriptorWriter};
use crate::endpoint::{EndpDirection, EndpointEntry};

/// bEndpointAddress bit set for device-to-host endpoints.
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// Mask that is ANDed to the attributes to get the transfer type.
pub const ENDP_ATTR_TY_MASK: u8 = 0x3;

/// The descriptor for a USB Endpoint (USB2 9.6.6).
///
/// This is returned as part of the configuration descriptor and cannot be requested
/// individually.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    pub const LEN: usize = 7;

    /// Describes a non-control endpoint of the static endpoint table, so the descriptor
    /// and the hardware setup can never disagree.
    pub const fn from_entry(entry: &EndpointEntry) -> Self {
        let address = match entry.direction() {
            EndpDirection::In => entry.number | ENDPOINT_DIR_IN,
            EndpDirection::Out => entry.number,
            EndpDirection::Bidirectional => panic!("control endpoints have no descriptor"),
        };
        Self {
            address,
            attributes: entry.kind as u8,
            max_packet_size: entry.max_packet_size,
            interval: entry.interval,
        }
    }

    pub const fn write<const N: usize>(&self, w: DescriptorWriter<N>) -> DescriptorWriter<N> {
        w.byte(Self::LEN as u8)
            .byte(DescriptorKind::Endpoint as u8)
            .byte(self.address)
            .byte(self.attributes)
            .word(self.max_packet_size)
            .byte(self.interval)
    }

    pub const fn number(&self) -> u8 {
        self.address & 0x0F
    }

    pub const fn is_in(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }

    pub const fn ty(&self) -> EndpointKind {
        match self.attributes & ENDP_ATTR_TY_MASK {
            0 => EndpointKind::Control,
            1 => EndpointKind::Isochronous,
            2 => EndpointKind::Bulk,
            3 => EndpointKind::Interrupt,
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRole;

    #[test]
    fn interrupt_in_from_table() {
        let entry = EndpointEntry {
            role: EndpointRole::Interrupt,
            number: 2,
            kind: EndpointKind::Interrupt,
            rx_buffer: None,
            tx_buffer: Some(0x100),
            max_packet_size: 64,
            interval: 0xFF,
        };
        let desc = EndpointDescriptor::from_entry(&entry);
        assert_eq!(desc.address, 0x82);
        assert!(desc.is_in());
        assert_eq!(desc.number(), 2);
        assert_eq!(desc.ty(), EndpointKind::Interrupt);
        assert_eq!(
            desc.write(DescriptorWriter::<7>::new()).finish(),
            [7, 5, 0x82, 3, 64, 0, 0xFF]
        );
    }
}
