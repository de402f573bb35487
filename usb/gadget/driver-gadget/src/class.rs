//! Class-specific control requests addressed to an interface.
//!
//! A function lists the requests it implements in a [`ClassRequestTable`]; anything not
//! in the table is unsupported and the control endpoint stalls. Adding a class request
//! is a table entry.

use crate::setup::{ReqDirection, Setup};
use crate::{ControlData, RequestError};

pub type DataInHandler = fn(&Setup) -> Result<ControlData, RequestError>;
/// Called once the complete host-to-device data stage has arrived.
pub type DataOutHandler = fn(&Setup, &[u8]) -> Result<(), RequestError>;
pub type NoDataHandler = fn(&Setup) -> Result<(), RequestError>;

#[derive(Clone, Copy)]
pub enum ClassHandler {
    DataIn(DataInHandler),
    DataOut(DataOutHandler),
    NoData(NoDataHandler),
}

#[derive(Clone, Copy)]
pub struct ClassRequest {
    pub request: u8,
    pub handler: ClassHandler,
}

/// What the control pipe does after a data-stage request was accepted.
pub enum DataStage {
    In(ControlData),
    Out(DataOutHandler),
}

#[derive(Clone, Copy)]
pub struct ClassRequestTable {
    requests: &'static [ClassRequest],
}

impl ClassRequestTable {
    /// No class requests at all: every one of them stalls.
    pub const EMPTY: Self = Self::new(&[]);

    pub const fn new(requests: &'static [ClassRequest]) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn lookup(&self, request: u8) -> Option<ClassHandler> {
        self.requests
            .iter()
            .find(|entry| entry.request == request)
            .map(|entry| entry.handler)
    }

    /// Dispatches a request with a data stage (wLength > 0).
    pub fn data_setup(&self, setup: &Setup) -> Result<DataStage, RequestError> {
        match (self.lookup(setup.request), setup.direction()) {
            (Some(ClassHandler::DataIn(handler)), ReqDirection::DeviceToHost) => {
                handler(setup).map(DataStage::In)
            }
            (Some(ClassHandler::DataOut(handler)), ReqDirection::HostToDevice) => {
                Ok(DataStage::Out(handler))
            }
            _ => Err(RequestError::Unsupported),
        }
    }

    /// Dispatches a request without a data stage (wLength == 0).
    pub fn no_data_setup(&self, setup: &Setup) -> Result<(), RequestError> {
        match self.lookup(setup.request) {
            Some(ClassHandler::NoData(handler)) => handler(setup),
            _ => Err(RequestError::Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_cur(_: &Setup) -> Result<ControlData, RequestError> {
        Ok(ControlData::inline(&[1, 2]))
    }

    fn commit(_: &Setup) -> Result<(), RequestError> {
        Ok(())
    }

    static REQUESTS: [ClassRequest; 2] = [
        ClassRequest {
            request: 0x81,
            handler: ClassHandler::DataIn(get_cur),
        },
        ClassRequest {
            request: 0x02,
            handler: ClassHandler::NoData(commit),
        },
    ];

    #[test]
    fn empty_table_is_unsupported() {
        let setup = Setup::class_interface(ReqDirection::DeviceToHost, 0x81, 0, 1, 26);
        assert!(matches!(
            ClassRequestTable::EMPTY.data_setup(&setup),
            Err(RequestError::Unsupported)
        ));
        assert!(matches!(
            ClassRequestTable::EMPTY.no_data_setup(&setup),
            Err(RequestError::Unsupported)
        ));
    }

    #[test]
    fn inserted_request_is_dispatched() {
        let table = ClassRequestTable::new(&REQUESTS);
        let setup = Setup::class_interface(ReqDirection::DeviceToHost, 0x81, 0, 1, 2);
        match table.data_setup(&setup) {
            Ok(DataStage::In(data)) => assert_eq!(data.as_slice(), &[1, 2]),
            _ => panic!("GET_CUR not dispatched"),
        }

        let setup = Setup::class_interface(ReqDirection::HostToDevice, 0x02, 0, 1, 0);
        assert!(table.no_data_setup(&setup).is_ok());
    }

    #[test]
    fn wrong_direction_is_unsupported() {
        let table = ClassRequestTable::new(&REQUESTS);
        let setup = Setup::class_interface(ReqDirection::HostToDevice, 0x81, 0, 1, 2);
        assert!(matches!(
            table.data_setup(&setup),
            Err(RequestError::Unsupported)
        ));
    }
}
