//! The configuration descriptor as an ordered list of entries, its encoder, and the
//! compile-time checks run over it.

use driver_gadget::descriptor::{
    ConfigDescriptor, DescriptorWriter, EndpointDescriptor, InterfaceAssociationDescriptor,
    InterfaceDescriptor,
};
use driver_gadget::endpoint::{self, EndpDirection, EndpointEntry};
use driver_udc::EndpointKind;

use crate::uvc::TT_STREAMING;
use crate::video::{Computed, VideoDescriptor};

/// One record following the configuration header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigEntry {
    Association(InterfaceAssociationDescriptor),
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
    Video(VideoDescriptor),
}

impl ConfigEntry {
    pub const fn len(&self) -> usize {
        match self {
            Self::Association(_) => InterfaceAssociationDescriptor::LEN,
            Self::Interface(_) => InterfaceDescriptor::LEN,
            Self::Endpoint(_) => EndpointDescriptor::LEN,
            Self::Video(video) => video.len(),
        }
    }
}

/// wTotalLength of a configuration made of `entries`.
pub const fn configuration_length(entries: &[ConfigEntry]) -> usize {
    let mut total = ConfigDescriptor::LEN;
    let mut i = 0;
    while i < entries.len() {
        total += entries[i].len();
        i += 1;
    }
    total
}

/// bNumInterfaces: interface descriptors for alternate setting zero.
pub const fn interface_count(entries: &[ConfigEntry]) -> u8 {
    let mut count = 0;
    let mut i = 0;
    while i < entries.len() {
        if let ConfigEntry::Interface(interface) = &entries[i] {
            if interface.alternate_setting == 0 {
                count += 1;
            }
        }
        i += 1;
    }
    count
}

/// Index one past the class-specific block that starts at `start`.
const fn video_block_end(entries: &[ConfigEntry], start: usize) -> usize {
    let mut i = start + 1;
    while i < entries.len() {
        match &entries[i] {
            ConfigEntry::Video(video) if !video.is_header() => i += 1,
            _ => break,
        }
    }
    i
}

/// Fills in the totals of the descriptor at `index` from the entries after it.
const fn computed(entries: &[ConfigEntry], index: usize) -> Computed {
    let ConfigEntry::Video(video) = &entries[index] else {
        return Computed {
            total_length: 0,
            count: 0,
        };
    };

    if video.is_header() {
        let end = video_block_end(entries, index);
        let mut total_length = 0;
        let mut formats = 0;
        let mut i = index;
        while i < end {
            total_length += entries[i].len();
            if let ConfigEntry::Video(video) = &entries[i] {
                if video.is_format() {
                    formats += 1;
                }
            }
            i += 1;
        }
        Computed {
            total_length: total_length as u16,
            count: formats,
        }
    } else if video.is_format() {
        let mut frames = 0;
        let mut i = index + 1;
        while i < entries.len() {
            match &entries[i] {
                ConfigEntry::Video(video) if video.is_frame() => frames += 1,
                _ => break,
            }
            i += 1;
        }
        Computed {
            total_length: 0,
            count: frames,
        }
    } else {
        Computed {
            total_length: 0,
            count: 0,
        }
    }
}

/// Serializes the complete configuration descriptor. `N` must equal
/// [`configuration_length`] of `entries`.
pub const fn encode_configuration<const N: usize>(
    header: &ConfigDescriptor,
    entries: &[ConfigEntry],
) -> [u8; N] {
    let total = configuration_length(entries);
    assert!(total == N, "configuration buffer size mismatch");
    assert!(total <= u16::MAX as usize, "configuration too long");

    let mut w = header.write(
        DescriptorWriter::<N>::new(),
        total as u16,
        interface_count(entries),
    );
    let mut i = 0;
    while i < entries.len() {
        w = match &entries[i] {
            ConfigEntry::Association(iad) => iad.write(w),
            ConfigEntry::Interface(interface) => interface.write(w),
            ConfigEntry::Endpoint(endpoint) => endpoint.write(w),
            ConfigEntry::Video(video) => video.write(w, computed(entries, i)),
        };
        i += 1;
    }
    w.finish()
}

/// Interface numbers are contiguous from zero, every association covers declared
/// interfaces and every VC header names existing streaming interfaces.
pub const fn validate_interfaces(entries: &[ConfigEntry]) -> bool {
    let count = interface_count(entries);
    let mut seen: u32 = 0;
    let mut i = 0;
    while i < entries.len() {
        match &entries[i] {
            ConfigEntry::Interface(interface) => {
                if interface.number >= 32 || interface.number >= count {
                    return false;
                }
                if interface.alternate_setting == 0 {
                    if seen & (1 << interface.number) != 0 {
                        return false;
                    }
                    seen |= 1 << interface.number;
                }
            }
            ConfigEntry::Association(iad) => {
                if iad.interface_count == 0
                    || iad.first_interface as u16 + iad.interface_count as u16 > count as u16
                {
                    return false;
                }
            }
            ConfigEntry::Video(VideoDescriptor::VcHeader { interfaces, .. }) => {
                let interfaces: &[u8] = interfaces;
                let mut j = 0;
                while j < interfaces.len() {
                    if interfaces[j] >= count {
                        return false;
                    }
                    j += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    true
}

/// Every entity reference in a video control block resolves, and following the
/// references from any entity ends at an input terminal.
pub const fn validate_linkage(entries: &[ConfigEntry]) -> bool {
    // Bit n set once entity n is known to be reachable from an input terminal.
    let mut resolved: u128 = 0;
    let mut defined: u128 = 0;

    let mut i = 0;
    while i < entries.len() {
        if let ConfigEntry::Video(video) = &entries[i] {
            if let Some(id) = video.entity_id() {
                if id == 0 || id >= 128 || defined & (1 << id) != 0 {
                    return false;
                }
                defined |= 1 << id;
                if let VideoDescriptor::CameraTerminal { .. } = video {
                    resolved |= 1 << id;
                }
            }
        }
        i += 1;
    }

    // A cycle never resolves, so each pass must make progress.
    let mut progress = true;
    while progress {
        progress = false;
        let mut i = 0;
        while i < entries.len() {
            if let ConfigEntry::Video(video) = &entries[i] {
                if let Some(id) = video.entity_id() {
                    if resolved & (1 << id) == 0 && sources_resolved(video, resolved) {
                        resolved |= 1 << id;
                        progress = true;
                    }
                }
            }
            i += 1;
        }
    }
    if resolved != defined {
        return false;
    }

    // Streaming interfaces must link to a streaming output terminal.
    let mut i = 0;
    while i < entries.len() {
        if let ConfigEntry::Video(VideoDescriptor::InputHeader { terminal_link, .. }) = &entries[i]
        {
            if !is_streaming_terminal(entries, *terminal_link) {
                return false;
            }
        }
        i += 1;
    }
    true
}

const fn sources_resolved(video: &VideoDescriptor, resolved: u128) -> bool {
    match video {
        VideoDescriptor::ProcessingUnit { source_id, .. }
        | VideoDescriptor::OutputTerminal { source_id, .. } => is_resolved(*source_id, resolved),
        VideoDescriptor::ExtensionUnit { sources, .. } => {
            let sources: &[u8] = sources;
            if sources.is_empty() {
                return false;
            }
            let mut i = 0;
            while i < sources.len() {
                if !is_resolved(sources[i], resolved) {
                    return false;
                }
                i += 1;
            }
            true
        }
        _ => false,
    }
}

const fn is_resolved(id: u8, resolved: u128) -> bool {
    id != 0 && id < 128 && resolved & (1 << id) != 0
}

const fn is_streaming_terminal(entries: &[ConfigEntry], id: u8) -> bool {
    let mut i = 0;
    while i < entries.len() {
        if let ConfigEntry::Video(VideoDescriptor::OutputTerminal {
            terminal_id,
            terminal_type,
            ..
        }) = &entries[i]
        {
            if *terminal_id == id {
                return *terminal_type == TT_STREAMING;
            }
        }
        i += 1;
    }
    false
}

/// Formats are numbered from one in order, each followed by at least one frame of its
/// own kind, also numbered from one; default frame and interval indices point at
/// existing frames and intervals; input headers carry controls for every format.
pub const fn validate_formats(entries: &[ConfigEntry]) -> bool {
    let mut i = 0;
    while i < entries.len() {
        if let ConfigEntry::Video(VideoDescriptor::InputHeader {
            control_size,
            controls,
            ..
        }) = &entries[i]
        {
            let formats = computed(entries, i).count;
            if formats == 0 || controls.len() != formats as usize * *control_size as usize {
                return false;
            }
            if !validate_streaming_block(entries, i + 1, video_block_end(entries, i)) {
                return false;
            }
        }
        i += 1;
    }
    true
}

const fn validate_streaming_block(entries: &[ConfigEntry], start: usize, end: usize) -> bool {
    let mut next_format = 1;
    let mut next_frame = 0;
    // 1 for uncompressed, 2 for MJPEG, 0 outside a format.
    let mut format_kind = 0;
    let mut frames = 0;
    let mut default_frame = 0;

    let mut i = start;
    while i <= end {
        let video = if i < end {
            match &entries[i] {
                ConfigEntry::Video(video) => Some(video),
                _ => None,
            }
        } else {
            None
        };

        // Close the previous format.
        let closes = match video {
            Some(video) => !video.is_frame(),
            None => true,
        };
        if closes && format_kind != 0 {
            if frames == 0 || default_frame == 0 || default_frame > frames {
                return false;
            }
            format_kind = 0;
        }

        match video {
            Some(VideoDescriptor::FormatUncompressed {
                format_index,
                default_frame_index,
                ..
            })
            | Some(VideoDescriptor::FormatMjpeg {
                format_index,
                default_frame_index,
                ..
            }) => {
                if *format_index != next_format {
                    return false;
                }
                next_format += 1;
                next_frame = 1;
                frames = 0;
                default_frame = *default_frame_index;
                format_kind = if matches!(video, Some(VideoDescriptor::FormatMjpeg { .. })) {
                    2
                } else {
                    1
                };
            }
            Some(VideoDescriptor::FrameUncompressed(frame))
            | Some(VideoDescriptor::FrameMjpeg(frame)) => {
                let kind = if matches!(video, Some(VideoDescriptor::FrameMjpeg(_))) {
                    2
                } else {
                    1
                };
                if kind != format_kind || frame.frame_index != next_frame {
                    return false;
                }
                if frame.min_bit_rate > frame.max_bit_rate
                    || !frame.intervals.contains(frame.default_frame_interval)
                {
                    return false;
                }
                next_frame += 1;
                frames += 1;
            }
            _ => {}
        }
        i += 1;
    }
    true
}

/// Every endpoint descriptor agrees with the endpoint table, every interface declares
/// exactly the endpoints that follow it, and every input header names its interface's
/// endpoint.
pub const fn validate_endpoints(entries: &[ConfigEntry], table: &[EndpointEntry]) -> bool {
    let mut i = 0;
    while i < entries.len() {
        match &entries[i] {
            ConfigEntry::Interface(interface) => {
                let mut endpoints = 0;
                let mut stream_endpoint = 0;
                let mut header_endpoint = 0;
                let mut j = i + 1;
                while j < entries.len() {
                    match &entries[j] {
                        ConfigEntry::Endpoint(endpoint) => {
                            endpoints += 1;
                            stream_endpoint = endpoint.address;
                        }
                        ConfigEntry::Video(VideoDescriptor::InputHeader {
                            endpoint_address, ..
                        }) => header_endpoint = *endpoint_address,
                        ConfigEntry::Video(_) => {}
                        _ => break,
                    }
                    j += 1;
                }
                if endpoints != interface.endpoints {
                    return false;
                }
                if header_endpoint != 0 && header_endpoint != stream_endpoint {
                    return false;
                }
            }
            ConfigEntry::Endpoint(endpoint) => {
                if !matches_table(endpoint, table) {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    true
}

const fn matches_table(endpoint: &EndpointDescriptor, table: &[EndpointEntry]) -> bool {
    let mut i = 0;
    while i < table.len() {
        let entry = &table[i];
        if entry.number == endpoint.number() {
            let direction_ok = match entry.direction() {
                EndpDirection::In => endpoint.is_in(),
                EndpDirection::Out => !endpoint.is_in(),
                EndpDirection::Bidirectional => false,
            };
            let interval_ok = match entry.kind {
                EndpointKind::Interrupt | EndpointKind::Isochronous => {
                    entry.interval == endpoint.interval
                }
                _ => true,
            };
            return direction_ok
                && interval_ok
                && entry.kind as u8 == endpoint.ty() as u8
                && entry.max_packet_size == endpoint.max_packet_size;
        }
        i += 1;
    }
    false
}

/// Every check above, plus the endpoint table's own.
pub const fn validate(entries: &[ConfigEntry], table: &[EndpointEntry]) -> bool {
    endpoint::validate_table(table)
        && validate_interfaces(entries)
        && validate_linkage(entries)
        && validate_formats(entries)
        && validate_endpoints(entries, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CONFIG_ENTRIES, ENDPOINTS};
    use crate::video::{Frame, FrameIntervals};

    fn replaced(index: usize, entry: ConfigEntry) -> Vec<ConfigEntry> {
        let mut entries = CONFIG_ENTRIES.to_vec();
        entries[index] = entry;
        entries
    }

    fn position(pred: impl Fn(&ConfigEntry) -> bool) -> usize {
        CONFIG_ENTRIES.iter().position(pred).unwrap()
    }

    #[test]
    fn device_tables_are_valid() {
        assert!(validate(CONFIG_ENTRIES, &ENDPOINTS));
    }

    #[test]
    fn dangling_source_rejected() {
        let index = position(|e| {
            matches!(e, ConfigEntry::Video(VideoDescriptor::OutputTerminal { .. }))
        });
        let entries = replaced(
            index,
            ConfigEntry::Video(VideoDescriptor::OutputTerminal {
                terminal_id: 4,
                terminal_type: TT_STREAMING,
                associated_terminal: 0,
                source_id: 9,
                terminal_str: 0,
            }),
        );
        assert!(!validate_linkage(&entries));
    }

    #[test]
    fn cycle_rejected() {
        // Processing unit 1 fed by extension unit 3, which is fed by unit 1.
        let index = position(|e| {
            matches!(e, ConfigEntry::Video(VideoDescriptor::ProcessingUnit { .. }))
        });
        let entries = replaced(
            index,
            ConfigEntry::Video(VideoDescriptor::ProcessingUnit {
                unit_id: 1,
                source_id: 3,
                max_multiplier: 0,
                controls: &[0, 0, 0],
                processing_str: 0,
                video_standards: 0,
            }),
        );
        assert!(!validate_linkage(&entries));
    }

    #[test]
    fn frame_numbering_checked() {
        let index = position(|e| matches!(e, ConfigEntry::Video(VideoDescriptor::FrameMjpeg(_))));
        let frame = Frame {
            frame_index: 2,
            capabilities: 0,
            width: 640,
            height: 480,
            min_bit_rate: 1,
            max_bit_rate: 1,
            max_frame_buffer_size: 0x500,
            default_frame_interval: 333_333,
            intervals: FrameIntervals::Discrete(&[333_333]),
        };
        let entries = replaced(index, ConfigEntry::Video(VideoDescriptor::FrameMjpeg(frame)));
        assert!(!validate_formats(&entries));

        // An MJPEG frame under the uncompressed format.
        let first = position(|e| {
            matches!(e, ConfigEntry::Video(VideoDescriptor::FrameUncompressed(_)))
        });
        let entries = replaced(
            first,
            ConfigEntry::Video(VideoDescriptor::FrameMjpeg(Frame {
                frame_index: 1,
                ..frame
            })),
        );
        assert!(!validate_formats(&entries));
    }

    #[test]
    fn default_interval_must_exist() {
        let index = position(|e| matches!(e, ConfigEntry::Video(VideoDescriptor::FrameMjpeg(_))));
        let ConfigEntry::Video(VideoDescriptor::FrameMjpeg(frame)) = CONFIG_ENTRIES[index] else {
            unreachable!()
        };
        let entries = replaced(
            index,
            ConfigEntry::Video(VideoDescriptor::FrameMjpeg(Frame {
                default_frame_interval: 1,
                ..frame
            })),
        );
        assert!(!validate_formats(&entries));
    }

    #[test]
    fn endpoint_must_match_table() {
        let index = position(|e| matches!(e, ConfigEntry::Endpoint(ep) if ep.address == 0x81));
        let entries = replaced(
            index,
            ConfigEntry::Endpoint(EndpointDescriptor {
                address: 0x81,
                attributes: 0x02,
                max_packet_size: 32,
                interval: 0,
            }),
        );
        assert!(!validate_endpoints(&entries, &ENDPOINTS));

        let mut entries = CONFIG_ENTRIES.to_vec();
        entries.pop();
        assert!(!validate_endpoints(&entries, &ENDPOINTS));
    }

    #[test]
    fn lengths_and_counts() {
        assert_eq!(configuration_length(&[]), ConfigDescriptor::LEN);
        assert_eq!(interface_count(CONFIG_ENTRIES), 2);

        let header = position(|e| {
            matches!(e, ConfigEntry::Video(VideoDescriptor::InputHeader { .. }))
        });
        assert_eq!(
            computed(CONFIG_ENTRIES, header),
            Computed {
                total_length: 119,
                count: 2
            }
        );
        let format = position(|e| {
            matches!(e, ConfigEntry::Video(VideoDescriptor::FormatMjpeg { .. }))
        });
        assert_eq!(computed(CONFIG_ENTRIES, format).count, 1);
    }
}
