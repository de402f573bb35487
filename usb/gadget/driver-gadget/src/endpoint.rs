//! Static endpoint table and its activation into the peripheral on bus reset.

use driver_udc::{EndpointKind, EndpointStatus, UDCAdapter};

/// Size of the peripheral's dedicated packet memory.
pub const PACKET_MEMORY_SIZE: u16 = 512;

/// What an endpoint is used for by the device's functions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpointRole {
    Control,
    /// Device-to-host bulk data
    BulkIn,
    /// Device-to-host status notifications
    Interrupt,
    /// Host-to-device bulk data
    BulkOut,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpDirection {
    Out,
    In,
    Bidirectional,
}

/// One endpoint of the static endpoint table.
///
/// Buffer addresses are offsets into packet memory; an endpoint that only transmits has
/// no receive buffer and vice versa. The control endpoint has both.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EndpointEntry {
    pub role: EndpointRole,
    pub number: u8,
    pub kind: EndpointKind,
    pub rx_buffer: Option<u16>,
    pub tx_buffer: Option<u16>,
    pub max_packet_size: u16,
    /// Polling interval in frames; only meaningful for interrupt endpoints.
    pub interval: u8,
}

impl EndpointEntry {
    pub const fn direction(&self) -> EndpDirection {
        match (self.rx_buffer.is_some(), self.tx_buffer.is_some()) {
            (true, true) => EndpDirection::Bidirectional,
            (false, true) => EndpDirection::In,
            _ => EndpDirection::Out,
        }
    }

    pub const fn is_control(&self) -> bool {
        matches!(self.kind, EndpointKind::Control)
    }
}

/// Checks a table at compile time: endpoint numbers are unique and below 8, endpoint 0
/// is the only control endpoint, every buffer lies inside packet memory and no two
/// buffers overlap.
pub const fn validate_table(table: &[EndpointEntry]) -> bool {
    let mut i = 0;
    while i < table.len() {
        let entry = &table[i];
        if entry.number >= driver_udc::MAX_ENDPOINTS as u8 {
            return false;
        }
        if entry.is_control() != (entry.number == 0) {
            return false;
        }
        if entry.rx_buffer.is_none() && entry.tx_buffer.is_none() {
            return false;
        }
        if !buffer_fits(entry.rx_buffer, entry.max_packet_size)
            || !buffer_fits(entry.tx_buffer, entry.max_packet_size)
        {
            return false;
        }
        if overlaps(entry.rx_buffer, entry.tx_buffer, entry.max_packet_size, entry.max_packet_size) {
            return false;
        }

        let mut j = i + 1;
        while j < table.len() {
            let other = &table[j];
            if other.number == entry.number {
                return false;
            }
            let (a, b) = (entry.max_packet_size, other.max_packet_size);
            if overlaps(entry.rx_buffer, other.rx_buffer, a, b)
                || overlaps(entry.rx_buffer, other.tx_buffer, a, b)
                || overlaps(entry.tx_buffer, other.rx_buffer, a, b)
                || overlaps(entry.tx_buffer, other.tx_buffer, a, b)
            {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn buffer_fits(buffer: Option<u16>, len: u16) -> bool {
    match buffer {
        Some(addr) => addr as u32 + len as u32 <= PACKET_MEMORY_SIZE as u32,
        None => true,
    }
}

const fn overlaps(a: Option<u16>, b: Option<u16>, a_len: u16, b_len: u16) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            (a as u32) < b as u32 + b_len as u32 && (b as u32) < a as u32 + a_len as u32
        }
        _ => false,
    }
}

/// Looks up the entry for an endpoint number.
pub fn find(table: &[EndpointEntry], number: u8) -> Option<&EndpointEntry> {
    table.iter().find(|entry| entry.number == number)
}

/// Programs every endpoint of the table into the peripheral, as required after each bus
/// reset.
///
/// Receive sides are primed valid with room for one packet. Transmit sides start NAKing
/// until the owning function has data, except the control endpoint's which stalls until
/// a control transfer needs it. Unused halves are disabled.
pub fn activate<T: UDCAdapter>(udc: &mut T, table: &[EndpointEntry], control_packet_size: u16) {
    for entry in table {
        let ep = entry.number;
        udc.set_ep_type(ep, entry.kind);

        match entry.tx_buffer {
            Some(addr) => {
                udc.set_ep_tx_addr(ep, addr);
                let status = if entry.is_control() {
                    EndpointStatus::Stall
                } else {
                    EndpointStatus::Nak
                };
                udc.set_ep_tx_status(ep, status);
            }
            None => udc.set_ep_tx_status(ep, EndpointStatus::Disabled),
        }

        match entry.rx_buffer {
            Some(addr) => {
                udc.set_ep_rx_addr(ep, addr);
                if entry.is_control() {
                    udc.clear_status_out(ep);
                    udc.set_ep_rx_count(ep, control_packet_size);
                } else {
                    udc.set_ep_rx_count(ep, entry.max_packet_size);
                }
                udc.set_ep_rx_status(ep, EndpointStatus::Valid);
            }
            None => udc.set_ep_rx_status(ep, EndpointStatus::Disabled),
        }

        log::trace!(
            "usb: endpoint {} {:?} {:?} rx={:?} tx={:?} mps={}",
            ep,
            entry.role,
            entry.kind,
            entry.rx_buffer,
            entry.tx_buffer,
            entry.max_packet_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_udc::mock::RecordingUdc;

    const TABLE: [EndpointEntry; 3] = [
        EndpointEntry {
            role: EndpointRole::Control,
            number: 0,
            kind: EndpointKind::Control,
            rx_buffer: Some(0x40),
            tx_buffer: Some(0x80),
            max_packet_size: 64,
            interval: 0,
        },
        EndpointEntry {
            role: EndpointRole::BulkIn,
            number: 1,
            kind: EndpointKind::Bulk,
            rx_buffer: None,
            tx_buffer: Some(0xC0),
            max_packet_size: 64,
            interval: 0,
        },
        EndpointEntry {
            role: EndpointRole::BulkOut,
            number: 3,
            kind: EndpointKind::Bulk,
            rx_buffer: Some(0x100),
            tx_buffer: None,
            max_packet_size: 64,
            interval: 0,
        },
    ];

    #[test]
    fn valid_table() {
        assert!(validate_table(&TABLE));
    }

    #[test]
    fn overlapping_buffers_rejected() {
        let mut table = TABLE;
        table[2].rx_buffer = Some(0xE0);
        assert!(!validate_table(&table));
    }

    #[test]
    fn buffer_past_packet_memory_rejected() {
        let mut table = TABLE;
        table[2].rx_buffer = Some(0x1E0);
        assert!(!validate_table(&table));
    }

    #[test]
    fn duplicate_number_rejected() {
        let mut table = TABLE;
        table[2].number = 1;
        assert!(!validate_table(&table));
    }

    #[test]
    fn activation_programs_every_endpoint() {
        let mut udc = RecordingUdc::new();
        activate(&mut udc, &TABLE, 64);

        let ctrl = udc.endpoint(0);
        assert_eq!(ctrl.kind, Some(EndpointKind::Control));
        assert_eq!(ctrl.rx_addr, Some(0x40));
        assert_eq!(ctrl.tx_addr, Some(0x80));
        assert_eq!(ctrl.rx_count, 64);
        assert_eq!(ctrl.rx_status, EndpointStatus::Valid);
        assert_eq!(ctrl.tx_status, EndpointStatus::Stall);
        assert!(ctrl.status_out_cleared);

        let tx = udc.endpoint(1);
        assert_eq!(tx.kind, Some(EndpointKind::Bulk));
        assert_eq!(tx.tx_addr, Some(0xC0));
        assert_eq!(tx.tx_status, EndpointStatus::Nak);
        assert_eq!(tx.rx_status, EndpointStatus::Disabled);

        let rx = udc.endpoint(3);
        assert_eq!(rx.rx_addr, Some(0x100));
        assert_eq!(rx.rx_count, 64);
        assert_eq!(rx.rx_status, EndpointStatus::Valid);
        assert_eq!(rx.tx_status, EndpointStatus::Disabled);
    }
}
