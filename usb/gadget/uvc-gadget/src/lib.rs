//! A USB video class camera with an auxiliary serial data channel, as one full-speed
//! composite device.
//!
//! [`PROPERTY`] describes the device to the enumeration core in `driver-gadget`; the
//! descriptor tables behind it are assembled and validated at compile time.

pub mod config;
pub mod datachannel;
pub mod device;
pub mod uvc;
pub mod video;

pub use self::datachannel::DataChannel;
pub use self::device::{CONFIGURATION, DEVICE, ENDPOINTS, PROPERTY, STRINGS};
