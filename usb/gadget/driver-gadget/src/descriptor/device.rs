//! Implements the "Device" USB Descriptor.
//!
//! This descriptor is described in USB2 section 9.6.1

use super::{DescriptorKind, DescriptorWriter};

/// A USB Device Descriptor.
///
/// A given device has exactly one. The bLength and bDescriptorType fields are implied
/// by the type. USB2 Table 9-8 gives the wire offsets of the fields, in declaration
/// order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceDescriptor {
    /// The USB standard version in binary-coded decimal (bcdUSB), 0x0200 for USB 2.0.
    pub usb: u16,
    /// bDeviceClass. 0xEF together with sub_class 0x02 and protocol 0x01 announces a
    /// composite device that groups its interfaces with association descriptors.
    pub class: u8,
    /// bDeviceSubClass
    pub sub_class: u8,
    /// bDeviceProtocol
    pub protocol: u8,
    /// bMaxPacketSize0, the control endpoint's packet size.
    pub packet_size: u8,
    /// idVendor
    pub vendor: u16,
    /// idProduct
    pub product: u16,
    /// The device release number in binary-coded decimal (bcdDevice).
    pub release: u16,
    /// iManufacturer
    pub manufacturer_str: u8,
    /// iProduct
    pub product_str: u8,
    /// iSerialNumber
    pub serial_str: u8,
    /// bNumConfigurations
    pub configurations: u8,
}

impl DeviceDescriptor {
    pub const LEN: usize = 18;

    pub const fn write<const N: usize>(&self, w: DescriptorWriter<N>) -> DescriptorWriter<N> {
        w.byte(Self::LEN as u8)
            .byte(DescriptorKind::Device as u8)
            .word(self.usb)
            .byte(self.class)
            .byte(self.sub_class)
            .byte(self.protocol)
            .byte(self.packet_size)
            .word(self.vendor)
            .word(self.product)
            .word(self.release)
            .byte(self.manufacturer_str)
            .byte(self.product_str)
            .byte(self.serial_str)
            .byte(self.configurations)
    }

    pub const fn bytes(&self) -> [u8; Self::LEN] {
        self.write(DescriptorWriter::new()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let desc = DeviceDescriptor {
            usb: 0x0200,
            class: 0xEF,
            sub_class: 0x02,
            protocol: 0x01,
            packet_size: 64,
            vendor: 0x1EAF,
            product: 0x0027,
            release: 0x0200,
            manufacturer_str: 1,
            product_str: 2,
            serial_str: 0,
            configurations: 1,
        };
        assert_eq!(
            desc.bytes(),
            [18, 1, 0x00, 0x02, 0xEF, 0x02, 0x01, 64, 0xAF, 0x1E, 0x27, 0x00, 0x00, 0x02, 1, 2, 0, 1]
        );
    }
}
