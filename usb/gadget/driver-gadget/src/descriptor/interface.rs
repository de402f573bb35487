use super::{DescriptorKind, DescriptorWriter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub endpoints: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub interface_str: u8,
}

impl InterfaceDescriptor {
    pub const LEN: usize = 9;

    pub const fn write<const N: usize>(&self, w: DescriptorWriter<N>) -> DescriptorWriter<N> {
        w.byte(Self::LEN as u8)
            .byte(DescriptorKind::Interface as u8)
            .byte(self.number)
            .byte(self.alternate_setting)
            .byte(self.endpoints)
            .byte(self.class)
            .byte(self.sub_class)
            .byte(self.protocol)
            .byte(self.interface_str)
    }
}
