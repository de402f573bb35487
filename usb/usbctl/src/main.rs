use clap::{App, Arg, SubCommand};
use log::{error, info};

use driver_gadget::descriptor::{DescriptorIter, DescriptorKind, LANGID_EN_US};
use driver_gadget::{DeviceProperty, Setup, UsbBus};
use driver_udc::mock::RecordingUdc;
use driver_udc::{UDCError, UdcEvent};
use uvc_gadget::uvc::{CS_ENDPOINT, CS_INTERFACE};
use uvc_gadget::{DataChannel, PROPERTY};

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn kind_name(kind: u8) -> &'static str {
    match DescriptorKind::from_u8(kind) {
        Some(DescriptorKind::Device) => "DEVICE",
        Some(DescriptorKind::Configuration) => "CONFIGURATION",
        Some(DescriptorKind::String) => "STRING",
        Some(DescriptorKind::Interface) => "INTERFACE",
        Some(DescriptorKind::Endpoint) => "ENDPOINT",
        Some(DescriptorKind::InterfaceAssociation) => "INTERFACE_ASSOCIATION",
        Some(_) => "OTHER",
        None if kind == CS_INTERFACE => "CS_INTERFACE",
        None if kind == CS_ENDPOINT => "CS_ENDPOINT",
        None => "UNKNOWN",
    }
}

fn dump(bytes: &[u8]) {
    for (len, kind, record) in DescriptorIter::new(bytes) {
        println!("{:3} {:<22} {}", len, kind_name(kind), hex(record));
    }
}

fn decode_string(descriptor: &[u8]) -> String {
    let units = descriptor
        .get(2..)
        .unwrap_or(&[])
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

fn print_endpoints(property: &DeviceProperty) {
    println!("num role       kind         rx     tx     mps interval");
    for entry in property.endpoints {
        let addr = |buf: Option<u16>| match buf {
            Some(addr) => format!("{:#05x}", addr),
            None => "-".to_string(),
        };
        println!(
            "{:3} {:<10} {:<12} {:<6} {:<6} {:3} {}",
            entry.number,
            format!("{:?}", entry.role),
            format!("{:?}", entry.kind),
            addr(entry.rx_buffer),
            addr(entry.tx_buffer),
            entry.max_packet_size,
            entry.interval
        );
    }
}

/// Runs one control transfer the way a host would and returns the data stage.
fn transfer(bus: &mut UsbBus<RecordingUdc>, setup: Setup) -> Result<Option<Vec<u8>>, UDCError> {
    bus.udc_mut().take_written();
    bus.handle_event(UdcEvent::Setup(setup.to_bytes()))?;

    let mut data = Vec::new();
    let stalled = loop {
        let written = bus.udc_mut().take_written();
        if written.is_empty() {
            break bus.udc().endpoint(0).tx_status == driver_udc::EndpointStatus::Stall;
        }
        for (_, packet) in written {
            data.extend(packet);
        }
        bus.handle_event(UdcEvent::ControlIn)?;
    };
    if stalled {
        return Ok(None);
    }
    if setup.direction() == driver_gadget::ReqDirection::DeviceToHost {
        bus.udc_mut().push_rx(0, &[]);
        bus.handle_event(UdcEvent::ControlOut)?;
    }
    Ok(Some(data))
}

fn enumerate(length: u16) -> Result<(), UDCError> {
    let mut bus = UsbBus::new(RecordingUdc::new(), &PROPERTY);
    DataChannel::new()
        .on_receive(|buf| info!("usbctl: received {}", hex(buf)))
        .on_interface_setup(|interface, alt| info!("usbctl: interface {} alt {}", interface, alt))
        .begin(&mut bus, None);
    println!("enabled: {:?}", bus.state());

    bus.handle_event(UdcEvent::Reset)?;
    println!("reset: {:?}", bus.state());

    let steps = [
        ("GET_DESCRIPTOR(DEVICE)", Setup::get_descriptor(DescriptorKind::Device, 0, 0, 64)),
        ("SET_ADDRESS(1)", Setup::set_address(1)),
        (
            "GET_DESCRIPTOR(CONFIGURATION)",
            Setup::get_descriptor(DescriptorKind::Configuration, 0, 0, 9),
        ),
        (
            "GET_DESCRIPTOR(CONFIGURATION)",
            Setup::get_descriptor(DescriptorKind::Configuration, 0, 0, length),
        ),
        ("GET_DESCRIPTOR(STRING 0)", Setup::get_descriptor(DescriptorKind::String, 0, 0, 0xFF)),
        (
            "GET_DESCRIPTOR(STRING 2)",
            Setup::get_descriptor(DescriptorKind::String, 2, LANGID_EN_US, 0xFF),
        ),
        ("SET_CONFIGURATION(1)", Setup::set_configuration(1)),
        ("GET_INTERFACE(1)", Setup::get_interface(1)),
        ("SET_INTERFACE(1, 0)", Setup::set_interface(1, 0)),
        ("GET_INTERFACE(5)", Setup::get_interface(5)),
    ];

    for (name, setup) in steps.iter() {
        match transfer(&mut bus, *setup)? {
            Some(data) if data.is_empty() => println!("{:<30} ok -> {:?}", name, bus.state()),
            Some(data) => println!("{:<30} {} bytes: {}", name, data.len(), hex(&data)),
            None => println!("{:<30} STALL", name),
        }
    }
    Ok(())
}

fn main() {
    let matches = App::new("usbctl")
        .about("Inspects the camera gadget's descriptors and enumeration")
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .short("v")
                .multiple(true),
        )
        .arg(
            Arg::with_name("LENGTH")
                .takes_value(true)
                .long("length")
                .short("l")
                .help("wLength the emulated host requests"),
        )
        .subcommand(SubCommand::with_name("device"))
        .subcommand(SubCommand::with_name("config"))
        .subcommand(
            SubCommand::with_name("string")
                .arg(Arg::with_name("INDEX").takes_value(true).required(true)),
        )
        .subcommand(SubCommand::with_name("endpoints"))
        .subcommand(SubCommand::with_name("enumerate"))
        .get_matches();

    if let Err(err) = common::setup_logging(
        "usb",
        "gadget",
        "usbctl",
        common::output_level(matches.occurrences_of("verbose")),
        common::file_level(),
    ) {
        eprintln!("usbctl: failed to set default logger: {}", err);
    }

    let length = match matches.value_of("LENGTH") {
        Some(length) => length
            .parse::<u16>()
            .expect("expected LENGTH to be a 16-bit integer"),
        None => u16::MAX,
    };

    match matches.subcommand() {
        ("device", _) => match (PROPERTY.get_device_descriptor)(length) {
            Some(desc) => dump(desc),
            None => println!("no device descriptor"),
        },
        ("config", _) => match (PROPERTY.get_config_descriptor)(length) {
            Some(desc) => dump(desc),
            None => println!("no configuration descriptor"),
        },
        ("string", Some(string_matches)) => {
            let index = string_matches
                .value_of("INDEX")
                .expect("no INDEX")
                .parse::<u8>()
                .expect("expected INDEX to be an 8-bit integer");
            match (PROPERTY.get_string_descriptor)(index, length) {
                Some(desc) if index == 0 => println!("{}", hex(desc)),
                Some(desc) => println!("{:?}", decode_string(desc)),
                None => println!("no string {}", index),
            }
        }
        ("endpoints", _) => print_endpoints(&PROPERTY),
        ("enumerate", _) => {
            if let Err(err) = enumerate(length) {
                error!("usbctl: enumeration failed: {}", err);
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("{}", matches.usage());
            std::process::exit(1);
        }
    }
}
