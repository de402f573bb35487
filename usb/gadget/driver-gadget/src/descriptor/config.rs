use super::{DescriptorKind, DescriptorWriter};

/// bmAttributes bit 7, reserved and always set.
pub const CONFIG_ATTR_BUS_POWERED: u8 = 0x80;
pub const CONFIG_ATTR_SELF_POWERED: u8 = 0x40;
pub const CONFIG_ATTR_REMOTE_WAKEUP: u8 = 0x20;

/// Configuration descriptor header (USB2 9.6.3).
///
/// wTotalLength and bNumInterfaces describe the records that follow the header, so the
/// encoder of the complete configuration supplies them when writing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConfigDescriptor {
    pub configuration_value: u8,
    pub configuration_str: u8,
    pub attributes: u8,
    /// In units of 2 mA.
    pub max_power: u8,
}

impl ConfigDescriptor {
    pub const LEN: usize = 9;

    pub const fn write<const N: usize>(
        &self,
        w: DescriptorWriter<N>,
        total_length: u16,
        interfaces: u8,
    ) -> DescriptorWriter<N> {
        w.byte(Self::LEN as u8)
            .byte(DescriptorKind::Configuration as u8)
            .word(total_length)
            .byte(interfaces)
            .byte(self.configuration_value)
            .byte(self.configuration_str)
            .byte(self.attributes)
            .byte(self.max_power)
    }
}

/// Interface Association Descriptor, binding a contiguous range of interfaces into one
/// function.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InterfaceAssociationDescriptor {
    pub first_interface: u8,
    pub interface_count: u8,
    pub function_class: u8,
    pub function_sub_class: u8,
    pub function_protocol: u8,
    pub function_str: u8,
}

impl InterfaceAssociationDescriptor {
    pub const LEN: usize = 8;

    pub const fn write<const N: usize>(&self, w: DescriptorWriter<N>) -> DescriptorWriter<N> {
        w.byte(Self::LEN as u8)
            .byte(DescriptorKind::InterfaceAssociation as u8)
            .byte(self.first_interface)
            .byte(self.interface_count)
            .byte(self.function_class)
            .byte(self.function_sub_class)
            .byte(self.function_protocol)
            .byte(self.function_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = ConfigDescriptor {
            configuration_value: 1,
            configuration_str: 0,
            attributes: CONFIG_ATTR_BUS_POWERED | CONFIG_ATTR_SELF_POWERED,
            max_power: 50,
        };
        let bytes = header.write(DescriptorWriter::<9>::new(), 248, 2).finish();
        assert_eq!(bytes, [9, 2, 248, 0, 2, 1, 0, 0xC0, 50]);
    }

    #[test]
    fn association_layout() {
        let iad = InterfaceAssociationDescriptor {
            first_interface: 0,
            interface_count: 2,
            function_class: 0x0E,
            function_sub_class: 0x03,
            function_protocol: 0,
            function_str: 1,
        };
        assert_eq!(
            iad.write(DescriptorWriter::<8>::new()).finish(),
            [8, 11, 0, 2, 0x0E, 0x03, 0, 1]
        );
    }
}
