//! Callbacks through which a class driver observes events that are not part of
//! enumeration, without the core depending on that driver.

pub type RawReceiveHook = Box<dyn FnMut(&[u8]) + Send>;
pub type InterfaceSetupHook = Box<dyn FnMut(u8, u8) + Send>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HookKind {
    /// A packet arrived on a non-control OUT endpoint.
    RawReceive,
    /// The host selected an alternate setting with SET_INTERFACE.
    InterfaceSetup,
}

pub enum Hook {
    RawReceive(RawReceiveHook),
    InterfaceSetup(InterfaceSetupHook),
}

impl Hook {
    pub fn raw_receive(f: impl FnMut(&[u8]) + Send + 'static) -> Self {
        Self::RawReceive(Box::new(f))
    }

    pub fn interface_setup(f: impl FnMut(u8, u8) + Send + 'static) -> Self {
        Self::InterfaceSetup(Box::new(f))
    }

    pub fn kind(&self) -> HookKind {
        match self {
            Self::RawReceive(_) => HookKind::RawReceive,
            Self::InterfaceSetup(_) => HookKind::InterfaceSetup,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookContext<'a> {
    RawReceive(&'a [u8]),
    InterfaceSetup { interface: u8, alternate_setting: u8 },
}

impl HookContext<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            Self::RawReceive(_) => HookKind::RawReceive,
            Self::InterfaceSetup { .. } => HookKind::InterfaceSetup,
        }
    }
}

/// At most one callback per kind; a later registration replaces the earlier one.
#[derive(Default)]
pub struct HookTable {
    raw_receive: Option<RawReceiveHook>,
    interface_setup: Option<InterfaceSetupHook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a previous callback of the same kind was replaced.
    pub fn register(&mut self, hook: Hook) -> bool {
        match hook {
            Hook::RawReceive(f) => self.raw_receive.replace(f).is_some(),
            Hook::InterfaceSetup(f) => self.interface_setup.replace(f).is_some(),
        }
    }

    pub fn unregister(&mut self, kind: HookKind) -> bool {
        match kind {
            HookKind::RawReceive => self.raw_receive.take().is_some(),
            HookKind::InterfaceSetup => self.interface_setup.take().is_some(),
        }
    }

    pub fn is_registered(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::RawReceive => self.raw_receive.is_some(),
            HookKind::InterfaceSetup => self.interface_setup.is_some(),
        }
    }

    /// Runs the callback registered for the context's kind. Returns `false` when none is
    /// registered, which is not an error.
    pub fn invoke(&mut self, context: HookContext<'_>) -> bool {
        match context {
            HookContext::RawReceive(buf) => match self.raw_receive.as_mut() {
                Some(f) => {
                    f(buf);
                    true
                }
                None => false,
            },
            HookContext::InterfaceSetup {
                interface,
                alternate_setting,
            } => match self.interface_setup.as_mut() {
                Some(f) => {
                    f(interface, alternate_setting);
                    true
                }
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivers_exact_buffer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut hooks = HookTable::new();
        assert!(!hooks.register(Hook::raw_receive(move |buf| {
            sink.lock().unwrap().push(buf.to_vec())
        })));

        assert!(hooks.invoke(HookContext::RawReceive(b"\x01\x02\x03")));
        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn missing_hook_is_a_no_op() {
        let mut hooks = HookTable::new();
        assert!(!hooks.invoke(HookContext::RawReceive(&[0xAA])));
        assert!(!hooks.invoke(HookContext::InterfaceSetup {
            interface: 1,
            alternate_setting: 0
        }));
    }

    #[test]
    fn last_registration_wins() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (Arc::clone(&calls), Arc::clone(&calls));

        let mut hooks = HookTable::new();
        hooks.register(Hook::interface_setup(move |i, a| {
            first.lock().unwrap().push(("first", i, a))
        }));
        assert!(hooks.register(Hook::interface_setup(move |i, a| {
            second.lock().unwrap().push(("second", i, a))
        })));

        hooks.invoke(HookContext::InterfaceSetup {
            interface: 1,
            alternate_setting: 0,
        });
        assert_eq!(*calls.lock().unwrap(), vec![("second", 1, 0)]);
    }

    #[test]
    fn unregister() {
        let mut hooks = HookTable::new();
        hooks.register(Hook::raw_receive(|_| {}));
        assert!(hooks.is_registered(HookKind::RawReceive));
        assert!(hooks.unregister(HookKind::RawReceive));
        assert!(!hooks.is_registered(HookKind::RawReceive));
        assert_eq!(HookContext::RawReceive(&[]).kind(), HookKind::RawReceive);
    }
}
