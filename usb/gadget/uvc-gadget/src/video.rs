//! UVC class-specific descriptors.
//!
//! Each descriptor is a variant of [`VideoDescriptor`] carrying its own fields; its
//! wire length is computed from those fields. Counts and totals that depend on the
//! surrounding descriptors (a header's wTotalLength, bNumFormats, a format's
//! bNumFrameDescriptors) are not stored but supplied by the configuration encoder.

use driver_gadget::descriptor::DescriptorWriter;

use crate::uvc::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameIntervals {
    /// The frame rates the frame supports, in 100 ns units.
    Discrete(&'static [u32]),
    Continuous { min: u32, max: u32, step: u32 },
}

impl FrameIntervals {
    const fn len(&self) -> usize {
        match self {
            Self::Discrete(intervals) => 4 * intervals.len(),
            Self::Continuous { .. } => 12,
        }
    }

    /// bFrameIntervalType
    const fn kind(&self) -> u8 {
        match self {
            Self::Discrete(intervals) => intervals.len() as u8,
            Self::Continuous { .. } => 0,
        }
    }

    pub const fn contains(&self, interval: u32) -> bool {
        match *self {
            Self::Discrete(intervals) => {
                let mut i = 0;
                while i < intervals.len() {
                    if intervals[i] == interval {
                        return true;
                    }
                    i += 1;
                }
                false
            }
            Self::Continuous { min, max, step } => {
                interval >= min && interval <= max && step != 0 && (interval - min) % step == 0
            }
        }
    }

    const fn write<const N: usize>(&self, mut w: DescriptorWriter<N>) -> DescriptorWriter<N> {
        match *self {
            Self::Discrete(intervals) => {
                let mut i = 0;
                while i < intervals.len() {
                    w = w.dword(intervals[i]);
                    i += 1;
                }
                w
            }
            Self::Continuous { min, max, step } => w.dword(min).dword(max).dword(step),
        }
    }
}

/// Fields shared by uncompressed and MJPEG frame descriptors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame {
    pub frame_index: u8,
    pub capabilities: u8,
    pub width: u16,
    pub height: u16,
    pub min_bit_rate: u32,
    pub max_bit_rate: u32,
    pub max_frame_buffer_size: u32,
    pub default_frame_interval: u32,
    pub intervals: FrameIntervals,
}

impl Frame {
    const fn len(&self) -> usize {
        26 + self.intervals.len()
    }

    const fn write<const N: usize>(&self, w: DescriptorWriter<N>, subtype: u8) -> DescriptorWriter<N> {
        let w = w
            .byte(self.len() as u8)
            .byte(CS_INTERFACE)
            .byte(subtype)
            .byte(self.frame_index)
            .byte(self.capabilities)
            .word(self.width)
            .word(self.height)
            .dword(self.min_bit_rate)
            .dword(self.max_bit_rate)
            .dword(self.max_frame_buffer_size)
            .dword(self.default_frame_interval)
            .byte(self.intervals.kind());
        self.intervals.write(w)
    }
}

/// Values a descriptor derives from the descriptors that follow it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Computed {
    /// wTotalLength of a video control or input header.
    pub total_length: u16,
    /// bNumFormats of an input header, bNumFrameDescriptors of a format.
    pub count: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VideoDescriptor {
    /// Class-specific video control interface header.
    VcHeader {
        uvc: u16,
        clock_frequency: u32,
        /// Video streaming interfaces in this collection.
        interfaces: &'static [u8],
    },
    /// Input terminal of type ITT_CAMERA.
    CameraTerminal {
        terminal_id: u8,
        associated_terminal: u8,
        terminal_str: u8,
        objective_focal_length_min: u16,
        objective_focal_length_max: u16,
        ocular_focal_length: u16,
        controls: &'static [u8],
    },
    ProcessingUnit {
        unit_id: u8,
        source_id: u8,
        max_multiplier: u16,
        controls: &'static [u8],
        processing_str: u8,
        video_standards: u8,
    },
    ExtensionUnit {
        unit_id: u8,
        guid: [u8; 16],
        num_controls: u8,
        sources: &'static [u8],
        controls: &'static [u8],
        extension_str: u8,
    },
    OutputTerminal {
        terminal_id: u8,
        terminal_type: u16,
        associated_terminal: u8,
        source_id: u8,
        terminal_str: u8,
    },
    /// Class-specific video streaming interface header for an IN endpoint.
    InputHeader {
        endpoint_address: u8,
        info: u8,
        terminal_link: u8,
        still_capture_method: u8,
        trigger_support: u8,
        trigger_usage: u8,
        control_size: u8,
        /// bmaControls, `control_size` bytes per format.
        controls: &'static [u8],
    },
    FormatUncompressed {
        format_index: u8,
        guid: [u8; 16],
        bits_per_pixel: u8,
        default_frame_index: u8,
        aspect_ratio_x: u8,
        aspect_ratio_y: u8,
        interlace_flags: u8,
        copy_protect: u8,
    },
    FrameUncompressed(Frame),
    FormatMjpeg {
        format_index: u8,
        flags: u8,
        default_frame_index: u8,
        aspect_ratio_x: u8,
        aspect_ratio_y: u8,
        interlace_flags: u8,
        copy_protect: u8,
    },
    FrameMjpeg(Frame),
    ColorMatching {
        color_primaries: u8,
        transfer_characteristics: u8,
        matrix_coefficients: u8,
    },
}

impl VideoDescriptor {
    /// bLength
    pub const fn len(&self) -> usize {
        match self {
            Self::VcHeader { interfaces, .. } => 12 + interfaces.len(),
            Self::CameraTerminal { controls, .. } => 15 + controls.len(),
            Self::ProcessingUnit { controls, .. } => 10 + controls.len(),
            Self::ExtensionUnit {
                sources, controls, ..
            } => 24 + sources.len() + controls.len(),
            Self::OutputTerminal { .. } => 9,
            Self::InputHeader { controls, .. } => 13 + controls.len(),
            Self::FormatUncompressed { .. } => 27,
            Self::FrameUncompressed(frame) | Self::FrameMjpeg(frame) => frame.len(),
            Self::FormatMjpeg { .. } => 11,
            Self::ColorMatching { .. } => 6,
        }
    }

    pub const fn subtype(&self) -> u8 {
        match self {
            Self::VcHeader { .. } => VC_HEADER,
            Self::CameraTerminal { .. } => VC_INPUT_TERMINAL,
            Self::ProcessingUnit { .. } => VC_PROCESSING_UNIT,
            Self::ExtensionUnit { .. } => VC_EXTENSION_UNIT,
            Self::OutputTerminal { .. } => VC_OUTPUT_TERMINAL,
            Self::InputHeader { .. } => VS_INPUT_HEADER,
            Self::FormatUncompressed { .. } => VS_FORMAT_UNCOMPRESSED,
            Self::FrameUncompressed(_) => VS_FRAME_UNCOMPRESSED,
            Self::FormatMjpeg { .. } => VS_FORMAT_MJPEG,
            Self::FrameMjpeg(_) => VS_FRAME_MJPEG,
            Self::ColorMatching { .. } => VS_COLORFORMAT,
        }
    }

    /// Headers whose totals cover the descriptors after them.
    pub const fn is_header(&self) -> bool {
        matches!(self, Self::VcHeader { .. } | Self::InputHeader { .. })
    }

    pub const fn is_format(&self) -> bool {
        matches!(
            self,
            Self::FormatUncompressed { .. } | Self::FormatMjpeg { .. }
        )
    }

    pub const fn is_frame(&self) -> bool {
        matches!(self, Self::FrameUncompressed(_) | Self::FrameMjpeg(_))
    }

    /// bTerminalID or bUnitID of a video control entity.
    pub const fn entity_id(&self) -> Option<u8> {
        match *self {
            Self::CameraTerminal { terminal_id, .. } | Self::OutputTerminal { terminal_id, .. } => {
                Some(terminal_id)
            }
            Self::ProcessingUnit { unit_id, .. } | Self::ExtensionUnit { unit_id, .. } => {
                Some(unit_id)
            }
            _ => None,
        }
    }

    pub const fn write<const N: usize>(
        &self,
        w: DescriptorWriter<N>,
        computed: Computed,
    ) -> DescriptorWriter<N> {
        let w = match self {
            Self::FrameUncompressed(_) | Self::FrameMjpeg(_) => w,
            _ => w.byte(self.len() as u8).byte(CS_INTERFACE).byte(self.subtype()),
        };

        match *self {
            Self::VcHeader {
                uvc,
                clock_frequency,
                interfaces,
            } => w
                .word(uvc)
                .word(computed.total_length)
                .dword(clock_frequency)
                .byte(interfaces.len() as u8)
                .bytes(interfaces),
            Self::CameraTerminal {
                terminal_id,
                associated_terminal,
                terminal_str,
                objective_focal_length_min,
                objective_focal_length_max,
                ocular_focal_length,
                controls,
            } => w
                .byte(terminal_id)
                .word(ITT_CAMERA)
                .byte(associated_terminal)
                .byte(terminal_str)
                .word(objective_focal_length_min)
                .word(objective_focal_length_max)
                .word(ocular_focal_length)
                .byte(controls.len() as u8)
                .bytes(controls),
            Self::ProcessingUnit {
                unit_id,
                source_id,
                max_multiplier,
                controls,
                processing_str,
                video_standards,
            } => w
                .byte(unit_id)
                .byte(source_id)
                .word(max_multiplier)
                .byte(controls.len() as u8)
                .bytes(controls)
                .byte(processing_str)
                .byte(video_standards),
            Self::ExtensionUnit {
                unit_id,
                guid,
                num_controls,
                sources,
                controls,
                extension_str,
            } => w
                .byte(unit_id)
                .bytes(&guid)
                .byte(num_controls)
                .byte(sources.len() as u8)
                .bytes(sources)
                .byte(controls.len() as u8)
                .bytes(controls)
                .byte(extension_str),
            Self::OutputTerminal {
                terminal_id,
                terminal_type,
                associated_terminal,
                source_id,
                terminal_str,
            } => w
                .byte(terminal_id)
                .word(terminal_type)
                .byte(associated_terminal)
                .byte(source_id)
                .byte(terminal_str),
            Self::InputHeader {
                endpoint_address,
                info,
                terminal_link,
                still_capture_method,
                trigger_support,
                trigger_usage,
                control_size,
                controls,
            } => w
                .byte(computed.count)
                .word(computed.total_length)
                .byte(endpoint_address)
                .byte(info)
                .byte(terminal_link)
                .byte(still_capture_method)
                .byte(trigger_support)
                .byte(trigger_usage)
                .byte(control_size)
                .bytes(controls),
            Self::FormatUncompressed {
                format_index,
                guid,
                bits_per_pixel,
                default_frame_index,
                aspect_ratio_x,
                aspect_ratio_y,
                interlace_flags,
                copy_protect,
            } => w
                .byte(format_index)
                .byte(computed.count)
                .bytes(&guid)
                .byte(bits_per_pixel)
                .byte(default_frame_index)
                .byte(aspect_ratio_x)
                .byte(aspect_ratio_y)
                .byte(interlace_flags)
                .byte(copy_protect),
            Self::FrameUncompressed(ref frame) => frame.write(w, VS_FRAME_UNCOMPRESSED),
            Self::FormatMjpeg {
                format_index,
                flags,
                default_frame_index,
                aspect_ratio_x,
                aspect_ratio_y,
                interlace_flags,
                copy_protect,
            } => w
                .byte(format_index)
                .byte(computed.count)
                .byte(flags)
                .byte(default_frame_index)
                .byte(aspect_ratio_x)
                .byte(aspect_ratio_y)
                .byte(interlace_flags)
                .byte(copy_protect),
            Self::FrameMjpeg(ref frame) => frame.write(w, VS_FRAME_MJPEG),
            Self::ColorMatching {
                color_primaries,
                transfer_characteristics,
                matrix_coefficients,
            } => w
                .byte(color_primaries)
                .byte(transfer_characteristics)
                .byte(matrix_coefficients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Frame = Frame {
        frame_index: 1,
        capabilities: 0,
        width: 320,
        height: 240,
        min_bit_rate: 0x0119_4000,
        max_bit_rate: 0x0119_4000,
        max_frame_buffer_size: 0x500,
        default_frame_interval: 2_000_000,
        intervals: FrameIntervals::Discrete(&[2_000_000]),
    };

    #[test]
    fn lengths_follow_variable_fields() {
        let pu = VideoDescriptor::ProcessingUnit {
            unit_id: 1,
            source_id: 2,
            max_multiplier: 0x400,
            controls: &[0, 0, 0],
            processing_str: 1,
            video_standards: 0,
        };
        assert_eq!(pu.len(), 13);
        assert_eq!(VideoDescriptor::FrameUncompressed(FRAME).len(), 30);

        let continuous = Frame {
            intervals: FrameIntervals::Continuous {
                min: 333_333,
                max: 2_000_000,
                step: 333_333,
            },
            ..FRAME
        };
        assert_eq!(VideoDescriptor::FrameMjpeg(continuous).len(), 38);
    }

    #[test]
    fn frame_encoding() {
        const ENCODED: [u8; 30] = VideoDescriptor::FrameUncompressed(FRAME)
            .write(DescriptorWriter::<30>::new(), Computed {
                total_length: 0,
                count: 0,
            })
            .finish();
        assert_eq!(&ENCODED[..5], &[30, CS_INTERFACE, VS_FRAME_UNCOMPRESSED, 1, 0]);
        assert_eq!(&ENCODED[5..9], &[0x40, 0x01, 0xF0, 0x00]);
        assert_eq!(ENCODED[25], 1);
        assert_eq!(&ENCODED[26..], &2_000_000u32.to_le_bytes());
    }

    #[test]
    fn header_uses_computed_totals() {
        let header = VideoDescriptor::VcHeader {
            uvc: 0x0110,
            clock_frequency: 6_000_000,
            interfaces: &[1],
        };
        let bytes = header
            .write(DescriptorWriter::<13>::new(), Computed {
                total_length: 80,
                count: 0,
            })
            .finish();
        assert_eq!(
            bytes,
            [13, 0x24, 0x01, 0x10, 0x01, 80, 0, 0x80, 0x8D, 0x5B, 0x00, 1, 1]
        );
    }

    #[test]
    fn interval_membership() {
        assert!(FRAME.intervals.contains(2_000_000));
        assert!(!FRAME.intervals.contains(333_333));
        let range = FrameIntervals::Continuous {
            min: 100,
            max: 400,
            step: 100,
        };
        assert!(range.contains(300));
        assert!(!range.contains(250));
        assert!(!range.contains(500));
    }
}
