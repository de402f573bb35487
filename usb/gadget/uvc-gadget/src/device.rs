//! The composite camera: a UVC function (video control + video streaming) plus the
//! data channel's endpoints, all as compile-time tables.

use static_assertions::{const_assert, const_assert_eq};

use driver_gadget::descriptor::{
    descriptor_data, ConfigDescriptor, DeviceDescriptor, EndpointDescriptor,
    InterfaceAssociationDescriptor, InterfaceDescriptor, CONFIG_ATTR_BUS_POWERED,
    CONFIG_ATTR_SELF_POWERED, LANGID_EN_US,
};
use driver_gadget::{
    endpoint, langid_descriptor, string_descriptor, ClassRequestTable, DeviceProperty,
    EndpointEntry, EndpointRole, RequestError,
};
use driver_udc::EndpointKind;

use crate::config::{self, ConfigEntry};
use crate::uvc::*;
use crate::video::{Frame, FrameIntervals, VideoDescriptor};

pub const VENDOR_ID: u16 = 0x1EAF;
pub const PRODUCT_ID: u16 = 0x0027;

/// bMaxPacketSize0
pub const CONTROL_PACKET_SIZE: u16 = 0x40;
pub const BULK_PACKET_SIZE: u16 = 0x40;

pub const CONTROL_ENDPOINT: u8 = 0;
/// Video stream and data channel transmit
pub const TX_ENDPOINT: u8 = 1;
/// Video control status interrupts
pub const MANAGEMENT_ENDPOINT: u8 = 2;
/// Data channel receive
pub const RX_ENDPOINT: u8 = 3;

pub const VIDEO_CONTROL_INTERFACE: u8 = 0;
pub const VIDEO_STREAMING_INTERFACE: u8 = 1;

pub const CONFIG_ATTRIBUTES: u8 = CONFIG_ATTR_BUS_POWERED | CONFIG_ATTR_SELF_POWERED;

pub const STRING_LANGID: u8 = 0;
pub const STRING_MANUFACTURER: u8 = 1;
pub const STRING_PRODUCT: u8 = 2;

/// Frame interval of every frame: 5 frames per second.
const FRAME_INTERVAL: u32 = INTERVAL_UNITS_PER_SECOND / 5;

// The buffer table occupies the first 0x40 bytes of packet memory.
pub const ENDPOINTS: [EndpointEntry; 4] = [
    EndpointEntry {
        role: EndpointRole::Control,
        number: CONTROL_ENDPOINT,
        kind: EndpointKind::Control,
        rx_buffer: Some(0x40),
        tx_buffer: Some(0x80),
        max_packet_size: CONTROL_PACKET_SIZE,
        interval: 0,
    },
    EndpointEntry {
        role: EndpointRole::BulkIn,
        number: TX_ENDPOINT,
        kind: EndpointKind::Bulk,
        rx_buffer: None,
        tx_buffer: Some(0xC0),
        max_packet_size: BULK_PACKET_SIZE,
        interval: 0,
    },
    EndpointEntry {
        role: EndpointRole::Interrupt,
        number: MANAGEMENT_ENDPOINT,
        kind: EndpointKind::Interrupt,
        rx_buffer: None,
        tx_buffer: Some(0x100),
        max_packet_size: 0x40,
        interval: 0xFF,
    },
    EndpointEntry {
        role: EndpointRole::BulkOut,
        number: RX_ENDPOINT,
        kind: EndpointKind::Bulk,
        rx_buffer: Some(0x140),
        tx_buffer: None,
        max_packet_size: BULK_PACKET_SIZE,
        interval: 0,
    },
];

pub const DEVICE_DESCRIPTOR: DeviceDescriptor = DeviceDescriptor {
    usb: 0x0200,
    // Miscellaneous / common class / interface association
    class: 0xEF,
    sub_class: 0x02,
    protocol: 0x01,
    packet_size: CONTROL_PACKET_SIZE as u8,
    vendor: VENDOR_ID,
    product: PRODUCT_ID,
    release: 0x0200,
    manufacturer_str: STRING_MANUFACTURER,
    product_str: STRING_PRODUCT,
    serial_str: 0,
    configurations: 1,
};

pub static DEVICE: [u8; DeviceDescriptor::LEN] = DEVICE_DESCRIPTOR.bytes();

pub const CONFIG_HEADER: ConfigDescriptor = ConfigDescriptor {
    configuration_value: 1,
    configuration_str: 0,
    attributes: CONFIG_ATTRIBUTES,
    // 100 mA
    max_power: 50,
};

pub const CONFIG_ENTRIES: &[ConfigEntry] = &[
    ConfigEntry::Association(InterfaceAssociationDescriptor {
        first_interface: VIDEO_CONTROL_INTERFACE,
        interface_count: 2,
        function_class: CC_VIDEO,
        function_sub_class: SC_VIDEO_INTERFACE_COLLECTION,
        function_protocol: PC_PROTOCOL_UNDEFINED,
        function_str: STRING_MANUFACTURER,
    }),
    ConfigEntry::Interface(InterfaceDescriptor {
        number: VIDEO_CONTROL_INTERFACE,
        alternate_setting: 0,
        endpoints: 1,
        class: CC_VIDEO,
        sub_class: SC_VIDEOCONTROL,
        protocol: PC_PROTOCOL_UNDEFINED,
        interface_str: STRING_MANUFACTURER,
    }),
    ConfigEntry::Video(VideoDescriptor::VcHeader {
        uvc: 0x0110,
        clock_frequency: 6_000_000,
        interfaces: &[VIDEO_STREAMING_INTERFACE],
    }),
    ConfigEntry::Video(VideoDescriptor::CameraTerminal {
        terminal_id: 2,
        associated_terminal: 0,
        terminal_str: 0,
        objective_focal_length_min: 0,
        objective_focal_length_max: 0,
        ocular_focal_length: 0,
        controls: &[0, 0],
    }),
    ConfigEntry::Video(VideoDescriptor::ProcessingUnit {
        unit_id: 1,
        source_id: 2,
        max_multiplier: 0x400,
        controls: &[0, 0, 0],
        processing_str: STRING_MANUFACTURER,
        video_standards: 0,
    }),
    ConfigEntry::Video(VideoDescriptor::ExtensionUnit {
        unit_id: 3,
        guid: [0xFF; 16],
        num_controls: 0,
        sources: &[1],
        controls: &[0, 0, 0],
        extension_str: 0,
    }),
    ConfigEntry::Video(VideoDescriptor::OutputTerminal {
        terminal_id: 4,
        terminal_type: TT_STREAMING,
        associated_terminal: 0,
        source_id: 1,
        terminal_str: STRING_MANUFACTURER,
    }),
    ConfigEntry::Endpoint(EndpointDescriptor::from_entry(&ENDPOINTS[2])),
    ConfigEntry::Interface(InterfaceDescriptor {
        number: VIDEO_STREAMING_INTERFACE,
        alternate_setting: 0,
        endpoints: 1,
        class: CC_VIDEO,
        sub_class: SC_VIDEOSTREAMING,
        protocol: PC_PROTOCOL_UNDEFINED,
        interface_str: STRING_MANUFACTURER,
    }),
    ConfigEntry::Video(VideoDescriptor::InputHeader {
        endpoint_address: 0x80 | TX_ENDPOINT,
        info: 0,
        terminal_link: 4,
        still_capture_method: 0,
        trigger_support: 0,
        trigger_usage: 0,
        control_size: 1,
        controls: &[0, 0],
    }),
    ConfigEntry::Video(VideoDescriptor::FormatUncompressed {
        format_index: 1,
        guid: GUID_YUY2,
        bits_per_pixel: 16,
        default_frame_index: 1,
        aspect_ratio_x: 0,
        aspect_ratio_y: 0,
        interlace_flags: 0,
        copy_protect: 0,
    }),
    ConfigEntry::Video(VideoDescriptor::FrameUncompressed(Frame {
        frame_index: 1,
        capabilities: 0,
        width: 320,
        height: 240,
        min_bit_rate: 0x0119_4000,
        max_bit_rate: 0x0119_4000,
        max_frame_buffer_size: 0x500,
        default_frame_interval: FRAME_INTERVAL,
        intervals: FrameIntervals::Discrete(&[FRAME_INTERVAL]),
    })),
    ConfigEntry::Video(VideoDescriptor::FormatMjpeg {
        format_index: 2,
        flags: 0,
        default_frame_index: 1,
        aspect_ratio_x: 0,
        aspect_ratio_y: 0,
        interlace_flags: 0,
        copy_protect: 0,
    }),
    ConfigEntry::Video(VideoDescriptor::FrameMjpeg(Frame {
        frame_index: 1,
        capabilities: 0,
        width: 1600,
        height: 1200,
        min_bit_rate: 4_800_000,
        max_bit_rate: 4_800_000,
        max_frame_buffer_size: 0x500,
        default_frame_interval: FRAME_INTERVAL,
        intervals: FrameIntervals::Discrete(&[FRAME_INTERVAL]),
    })),
    ConfigEntry::Video(VideoDescriptor::ColorMatching {
        // BT.709, BT.709, SMPTE 170M
        color_primaries: 1,
        transfer_characteristics: 1,
        matrix_coefficients: 4,
    }),
    ConfigEntry::Endpoint(EndpointDescriptor::from_entry(&ENDPOINTS[1])),
];

pub const CONFIG_LEN: usize = config::configuration_length(CONFIG_ENTRIES);
pub const NUM_INTERFACES: u8 = config::interface_count(CONFIG_ENTRIES);

pub static CONFIGURATION: [u8; CONFIG_LEN] =
    config::encode_configuration(&CONFIG_HEADER, CONFIG_ENTRIES);

const_assert!(endpoint::validate_table(&ENDPOINTS));
const_assert!(config::validate(CONFIG_ENTRIES, &ENDPOINTS));
const_assert_eq!(CONFIG_LEN, 248);
const_assert_eq!(NUM_INTERFACES, 2);

pub const MANUFACTURER: &str = "LeafLabs";
pub const PRODUCT: &str = "Maple";

/// Indexed by string descriptor index; index 0 lists the supported languages.
pub static STRINGS: [&[u8]; 3] = [
    langid_descriptor!(LANGID_EN_US),
    string_descriptor!(MANUFACTURER),
    string_descriptor!(PRODUCT),
];

fn device_descriptor(length: u16) -> Option<&'static [u8]> {
    Some(descriptor_data(&DEVICE, length))
}

fn config_descriptor(length: u16) -> Option<&'static [u8]> {
    Some(descriptor_data(&CONFIGURATION, length))
}

fn string_descriptor(index: u8, length: u16) -> Option<&'static [u8]> {
    STRINGS
        .get(usize::from(index))
        .map(|desc| descriptor_data(desc, length))
}

/// Only alternate setting zero of the declared interfaces exists.
pub fn interface_setting(interface: u8, alternate_setting: u8) -> Result<(), RequestError> {
    if alternate_setting > 0 || interface >= NUM_INTERFACES {
        return Err(RequestError::Unsupported);
    }
    Ok(())
}

pub static PROPERTY: DeviceProperty = DeviceProperty {
    max_packet_size: CONTROL_PACKET_SIZE,
    total_configurations: DEVICE_DESCRIPTOR.configurations,
    config_attributes: CONFIG_ATTRIBUTES,
    endpoints: &ENDPOINTS,
    get_device_descriptor: device_descriptor,
    get_config_descriptor: config_descriptor,
    get_string_descriptor: string_descriptor,
    get_interface_setting: interface_setting,
    // Video probe/commit and control requests are left to a streaming layer.
    class_requests: ClassRequestTable::EMPTY,
};

#[cfg(test)]
mod tests {
    use super::*;
    use driver_gadget::descriptor::{DescriptorIter, DescriptorKind};

    #[test]
    fn device_descriptor_bytes() {
        assert_eq!(
            DEVICE,
            [
                18, 1, 0x00, 0x02, 0xEF, 0x02, 0x01, 0x40, 0xAF, 0x1E, 0x27, 0x00, 0x00, 0x02,
                1, 2, 0, 1
            ]
        );
    }

    #[test]
    fn total_length_is_sum_of_records() {
        let declared = u16::from_le_bytes([CONFIGURATION[2], CONFIGURATION[3]]);
        let sum: usize = DescriptorIter::new(&CONFIGURATION)
            .map(|(len, _, _)| usize::from(len))
            .sum();
        assert_eq!(usize::from(declared), CONFIGURATION.len());
        assert_eq!(sum, CONFIGURATION.len());
        assert_eq!(CONFIGURATION[4], 2);
        assert_eq!(CONFIGURATION[7], 0xC0);
    }

    #[test]
    fn class_header_totals() {
        let records: Vec<_> = DescriptorIter::new(&CONFIGURATION).collect();

        let (_, _, vc_header) = records
            .iter()
            .find(|(_, kind, bytes)| *kind == CS_INTERFACE && bytes[2] == VC_HEADER)
            .copied()
            .unwrap();
        assert_eq!(u16::from_le_bytes([vc_header[5], vc_header[6]]), 80);

        // The input header shares subtype 1 with the VC header; it is the second one.
        let (_, _, vs_header) = records
            .iter()
            .filter(|(_, kind, bytes)| *kind == CS_INTERFACE && bytes[2] == VS_INPUT_HEADER)
            .nth(1)
            .copied()
            .unwrap();
        assert_eq!(vs_header[3], 2);
        assert_eq!(u16::from_le_bytes([vs_header[4], vs_header[5]]), 119);
        assert_eq!(vs_header[6], 0x81);
    }

    #[test]
    fn endpoint_descriptors() {
        let endpoints: Vec<_> = DescriptorIter::new(&CONFIGURATION)
            .filter(|(_, kind, _)| *kind == DescriptorKind::Endpoint as u8)
            .map(|(_, _, bytes)| bytes.to_vec())
            .collect();
        assert_eq!(
            endpoints,
            vec![
                vec![7, 5, 0x82, 0x03, 0x40, 0x00, 0xFF],
                vec![7, 5, 0x81, 0x02, 0x40, 0x00, 0x00],
            ]
        );
    }

    #[test]
    fn strings() {
        assert_eq!(string_descriptor(0, 0xFF), Some(&[4, 3, 0x09, 0x04][..]));
        assert_eq!(
            string_descriptor(1, 0xFF).map(|d| d.len()),
            Some(2 + 2 * MANUFACTURER.len())
        );
        assert_eq!(string_descriptor(2, 4), Some(&[12, 3, b'M', 0][..]));
        assert_eq!(string_descriptor(3, 0xFF), None);
        assert_eq!(string_descriptor(99, 0xFF), None);
    }

    #[test]
    fn interface_settings() {
        assert!(interface_setting(0, 0).is_ok());
        assert!(interface_setting(1, 0).is_ok());
        assert!(matches!(
            interface_setting(5, 0),
            Err(RequestError::Unsupported)
        ));
        assert!(matches!(
            interface_setting(1, 1),
            Err(RequestError::Unsupported)
        ));
    }

    #[test]
    fn rx_buffer_clear_of_interrupt_buffer() {
        let interrupt = ENDPOINTS[2].tx_buffer.unwrap();
        let rx = ENDPOINTS[3].rx_buffer.unwrap();
        assert!(rx >= interrupt + ENDPOINTS[2].max_packet_size);
    }
}
