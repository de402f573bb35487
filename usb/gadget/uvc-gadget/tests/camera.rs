use std::sync::{Arc, Mutex};

use driver_gadget::descriptor::{DescriptorKind, LANGID_EN_US};
use driver_gadget::{ConnectionState, HookKind, Setup, UsbBus};
use driver_udc::mock::{RecordingPin, RecordingUdc};
use driver_udc::{EndpointStatus, PinMode, UdcEvent};

use uvc_gadget::device::{RX_ENDPOINT, TX_ENDPOINT};
use uvc_gadget::{DataChannel, CONFIGURATION, DEVICE, ENDPOINTS, PROPERTY};

fn send(bus: &mut UsbBus<RecordingUdc>, setup: Setup) {
    bus.handle_event(UdcEvent::Setup(setup.to_bytes())).unwrap();
}

/// Issues a device-to-host request and collects the data stage.
fn read(bus: &mut UsbBus<RecordingUdc>, setup: Setup) -> Vec<u8> {
    bus.udc_mut().take_written();
    send(bus, setup);
    let mut data = Vec::new();
    loop {
        let written = bus.udc_mut().take_written();
        if written.is_empty() {
            break;
        }
        for (_, packet) in written {
            data.extend(packet);
        }
        bus.handle_event(UdcEvent::ControlIn).unwrap();
    }
    bus.udc_mut().push_rx(0, &[]);
    bus.handle_event(UdcEvent::ControlOut).unwrap();
    data
}

fn no_data(bus: &mut UsbBus<RecordingUdc>, setup: Setup) {
    send(bus, setup);
    bus.handle_event(UdcEvent::ControlIn).unwrap();
}

fn stalled(bus: &UsbBus<RecordingUdc>) -> bool {
    bus.udc().endpoint(0).tx_status == EndpointStatus::Stall
}

fn started() -> UsbBus<RecordingUdc> {
    let mut bus = UsbBus::new(RecordingUdc::new(), &PROPERTY);
    assert!(DataChannel::new().begin(&mut bus, None));
    bus.handle_event(UdcEvent::Reset).unwrap();
    bus
}

#[test]
fn host_enumeration() {
    let mut bus = started();

    // Windows asks for 64 bytes of the device descriptor before addressing.
    let head = read(&mut bus, Setup::get_descriptor(DescriptorKind::Device, 0, 0, 64));
    assert_eq!(head, DEVICE);

    no_data(&mut bus, Setup::set_address(12));
    assert_eq!(bus.state(), ConnectionState::Addressed);
    assert_eq!(bus.udc().address, 12);

    let header = read(
        &mut bus,
        Setup::get_descriptor(DescriptorKind::Configuration, 0, 0, 9),
    );
    assert_eq!(header, &CONFIGURATION[..9]);
    let total = u16::from_le_bytes([header[2], header[3]]);
    assert_eq!(total, 248);

    let config = read(
        &mut bus,
        Setup::get_descriptor(DescriptorKind::Configuration, 0, 0, total),
    );
    assert_eq!(config, CONFIGURATION);

    let product = read(
        &mut bus,
        Setup::get_descriptor(DescriptorKind::String, 2, LANGID_EN_US, 0xFF),
    );
    assert_eq!(product, [12, 3, b'M', 0, b'a', 0, b'p', 0, b'l', 0, b'e', 0]);

    no_data(&mut bus, Setup::set_configuration(1));
    assert_eq!(bus.state(), ConnectionState::Configured);
    assert_eq!(read(&mut bus, Setup::get_interface(1)), [0]);
}

#[test]
fn endpoints_after_reset_match_table() {
    let bus = started();
    for entry in &ENDPOINTS {
        let regs = bus.udc().endpoint(entry.number);
        assert_eq!(regs.kind, Some(entry.kind));
        assert_eq!(regs.rx_addr, entry.rx_buffer);
        assert_eq!(regs.tx_addr, entry.tx_buffer);
    }
    assert_eq!(bus.udc().endpoint(RX_ENDPOINT).rx_status, EndpointStatus::Valid);
    assert_eq!(bus.udc().endpoint(TX_ENDPOINT).tx_status, EndpointStatus::Nak);
}

#[test]
fn out_of_range_requests_stall() {
    let mut bus = started();
    no_data(&mut bus, Setup::set_address(3));
    no_data(&mut bus, Setup::set_configuration(1));

    send(&mut bus, Setup::get_interface(5));
    assert!(stalled(&bus));

    send(&mut bus, Setup::set_interface(1, 1));
    assert!(stalled(&bus));

    send(
        &mut bus,
        Setup::get_descriptor(DescriptorKind::String, 99, LANGID_EN_US, 0xFF),
    );
    assert!(stalled(&bus));

    // No class requests are declared.
    send(
        &mut bus,
        Setup::class_interface(driver_gadget::ReqDirection::DeviceToHost, 0x81, 0x0100, 1, 26),
    );
    assert!(stalled(&bus));
}

#[test]
fn data_channel_begins_once() {
    let mut pin = RecordingPin::default();
    let mut bus = UsbBus::new(RecordingUdc::new(), &PROPERTY);
    let mut channel = DataChannel::new().on_receive(|_| {});

    assert!(channel.begin(&mut bus, Some(&mut pin)));
    assert_eq!(pin.mode, Some(PinMode::OutputPushPull));
    assert_eq!(pin.level, Some(false));
    assert!(bus.unregister_hook(HookKind::RawReceive));
    assert!(!bus.unregister_hook(HookKind::InterfaceSetup));

    // A second channel does not re-enable the bus.
    assert!(!DataChannel::new().begin(&mut bus, Some(&mut pin)));
    assert_eq!(bus.udc().force_resets, 1);

    channel.end(&mut bus, Some(&mut pin));
    assert_eq!(pin.level, Some(true));
    assert!(!bus.udc().irq_enabled);
}

#[test]
fn data_channel_traffic() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let settings = Arc::new(Mutex::new(Vec::new()));
    let (rx_sink, setup_sink) = (Arc::clone(&received), Arc::clone(&settings));

    let mut bus = UsbBus::new(RecordingUdc::new(), &PROPERTY);
    DataChannel::new()
        .on_receive(move |buf| rx_sink.lock().unwrap().extend_from_slice(buf))
        .on_interface_setup(move |interface, alternate_setting| {
            setup_sink.lock().unwrap().push((interface, alternate_setting))
        })
        .begin(&mut bus, None);
    bus.handle_event(UdcEvent::Reset).unwrap();

    assert!(!DataChannel::is_connected(&bus));
    assert!(DataChannel::write(&mut bus, b"early").is_err());

    no_data(&mut bus, Setup::set_address(3));
    no_data(&mut bus, Setup::set_configuration(1));
    assert!(DataChannel::is_connected(&bus));

    bus.udc_mut().push_rx(RX_ENDPOINT, b"hello");
    bus.handle_event(UdcEvent::EndpointOut(RX_ENDPOINT)).unwrap();
    assert_eq!(*received.lock().unwrap(), b"hello");

    no_data(&mut bus, Setup::set_interface(1, 0));
    assert_eq!(*settings.lock().unwrap(), vec![(1, 0)]);

    let long = [0x55u8; 100];
    assert_eq!(DataChannel::write(&mut bus, &long), Ok(64));
    assert_eq!(bus.udc().written_to(TX_ENDPOINT), vec![&long[..64]]);
}

#[test]
fn suspend_pauses_data_channel() {
    let mut bus = started();
    no_data(&mut bus, Setup::set_address(3));
    no_data(&mut bus, Setup::set_configuration(1));
    assert!(DataChannel::is_connected(&bus));

    bus.handle_event(UdcEvent::Suspend).unwrap();
    assert!(!DataChannel::is_connected(&bus));
    assert_eq!(bus.state(), ConnectionState::Configured);

    bus.handle_event(UdcEvent::Wakeup).unwrap();
    assert!(DataChannel::is_connected(&bus));
}

#[test]
fn remote_wakeup_not_advertised() {
    let mut bus = started();
    no_data(&mut bus, Setup::set_address(3));
    no_data(&mut bus, Setup::set_configuration(1));

    send(&mut bus, Setup::set_feature(1));
    assert!(stalled(&bus));
    assert!(!bus.device().remote_wakeup_enabled());

    // Self-powered, no remote wakeup.
    assert_eq!(read(&mut bus, Setup::get_status()), [1, 0]);
}
