//! In-memory peripheral that records every register write.

use std::collections::VecDeque;

use crate::{
    EndpointKind, EndpointStatus, IrqMask, PinMode, PresencePin, Result, UDCAdapter, UDCError,
    MAX_ENDPOINTS,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EndpointRegs {
    pub kind: Option<EndpointKind>,
    pub rx_addr: Option<u16>,
    pub tx_addr: Option<u16>,
    pub rx_count: u16,
    pub rx_status: EndpointStatus,
    pub tx_status: EndpointStatus,
    pub status_out_cleared: bool,
}

#[derive(Debug)]
pub struct RecordingUdc {
    pub endpoints: [EndpointRegs; MAX_ENDPOINTS],
    pub address: u8,
    pub btable: Option<u16>,
    pub irq_mask: IrqMask,
    pub irq_enabled: bool,
    pub force_resets: usize,
    pub interrupt_clears: usize,
    /// Every packet handed to `write_ep`, in order.
    pub written: Vec<(u8, Vec<u8>)>,
    pub max_packet: usize,
    pending: [VecDeque<Vec<u8>>; MAX_ENDPOINTS],
}

impl Default for RecordingUdc {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUdc {
    pub fn new() -> Self {
        Self {
            endpoints: [EndpointRegs::default(); MAX_ENDPOINTS],
            address: 0,
            btable: None,
            irq_mask: IrqMask::empty(),
            irq_enabled: false,
            force_resets: 0,
            interrupt_clears: 0,
            written: Vec::new(),
            max_packet: 64,
            pending: Default::default(),
        }
    }

    /// Queues a packet as if the host had sent it to `ep`.
    pub fn push_rx(&mut self, ep: u8, data: &[u8]) {
        self.pending[ep as usize].push_back(data.to_vec());
    }

    pub fn endpoint(&self, ep: u8) -> &EndpointRegs {
        &self.endpoints[ep as usize]
    }

    /// Packets written to `ep`, oldest first.
    pub fn written_to(&self, ep: u8) -> Vec<&[u8]> {
        self.written
            .iter()
            .filter(|(e, _)| *e == ep)
            .map(|(_, data)| data.as_slice())
            .collect()
    }

    pub fn take_written(&mut self) -> Vec<(u8, Vec<u8>)> {
        std::mem::take(&mut self.written)
    }

    fn regs(&mut self, ep: u8) -> &mut EndpointRegs {
        &mut self.endpoints[ep as usize]
    }

    fn check(ep: u8) -> Result<usize> {
        let index = ep as usize;
        if index >= MAX_ENDPOINTS {
            return Err(UDCError::InvalidEndpoint(ep));
        }
        Ok(index)
    }
}

impl UDCAdapter for RecordingUdc {
    fn write_ep(&mut self, ep: u8, buf: &[u8]) -> Result<usize> {
        Self::check(ep)?;
        if buf.len() > self.max_packet {
            return Err(UDCError::PacketTooLarge {
                ep,
                len: buf.len(),
                max: self.max_packet,
            });
        }
        self.written.push((ep, buf.to_vec()));
        Ok(buf.len())
    }

    fn read_ep(&mut self, ep: u8, buf: &mut [u8]) -> Result<Option<usize>> {
        let index = Self::check(ep)?;
        match self.pending[index].pop_front() {
            Some(packet) => {
                let len = packet.len().min(buf.len());
                buf[..len].copy_from_slice(&packet[..len]);
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }

    fn force_reset(&mut self) {
        self.force_resets += 1;
    }

    fn set_irq_mask(&mut self, mask: IrqMask) {
        self.irq_mask = mask;
    }

    fn clear_interrupts(&mut self) {
        self.interrupt_clears += 1;
    }

    fn enable_irq(&mut self) {
        self.irq_enabled = true;
    }

    fn disable_irq(&mut self) {
        self.irq_enabled = false;
    }

    fn set_btable(&mut self, addr: u16) {
        self.btable = Some(addr);
    }

    fn set_device_address(&mut self, address: u8) {
        self.address = address;
    }

    fn set_ep_type(&mut self, ep: u8, kind: EndpointKind) {
        self.regs(ep).kind = Some(kind);
    }

    fn set_ep_rx_addr(&mut self, ep: u8, addr: u16) {
        self.regs(ep).rx_addr = Some(addr);
    }

    fn set_ep_tx_addr(&mut self, ep: u8, addr: u16) {
        self.regs(ep).tx_addr = Some(addr);
    }

    fn set_ep_rx_count(&mut self, ep: u8, count: u16) {
        self.regs(ep).rx_count = count;
    }

    fn set_ep_rx_status(&mut self, ep: u8, status: EndpointStatus) {
        self.regs(ep).rx_status = status;
    }

    fn set_ep_tx_status(&mut self, ep: u8, status: EndpointStatus) {
        self.regs(ep).tx_status = status;
    }

    fn clear_status_out(&mut self, ep: u8) {
        self.regs(ep).status_out_cleared = true;
    }
}

#[derive(Debug, Default)]
pub struct RecordingPin {
    pub mode: Option<PinMode>,
    pub level: Option<bool>,
    pub writes: usize,
}

impl PresencePin for RecordingPin {
    fn set_mode(&mut self, mode: PinMode) {
        self.mode = Some(mode);
    }

    fn write(&mut self, level: bool) {
        self.level = Some(level);
        self.writes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_endpoint() {
        let mut udc = RecordingUdc::new();
        assert_eq!(
            udc.write_ep(9, &[1]),
            Err(UDCError::InvalidEndpoint(9))
        );
        assert_eq!(udc.read_ep(8, &mut [0; 4]), Err(UDCError::InvalidEndpoint(8)));
    }

    #[test]
    fn rx_queue_is_fifo() {
        let mut udc = RecordingUdc::new();
        udc.push_rx(3, b"ab");
        udc.push_rx(3, b"cde");

        let mut buf = [0u8; 8];
        assert_eq!(udc.read_ep(3, &mut buf), Ok(Some(2)));
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(udc.read_ep(3, &mut buf), Ok(Some(3)));
        assert_eq!(&buf[..3], b"cde");
        assert_eq!(udc.read_ep(3, &mut buf), Ok(None));
    }

    #[test]
    fn oversized_packet() {
        let mut udc = RecordingUdc::new();
        let err = udc.write_ep(1, &[0; 65]).unwrap_err();
        assert_eq!(
            err,
            UDCError::PacketTooLarge {
                ep: 1,
                len: 65,
                max: 64
            }
        );
    }
}
