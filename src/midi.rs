// src/midi.rs
//
// MIDI input bridge.
//
// A host port holds a single listener, and every session shares the same
// ports. `MidiHub` owns that slot: it installs one forwarder per port while
// any session listens and fans each message out to the subscribed bridges.
// One `MidiBridge` exists per running, MIDI-enabled unit; its
// subscriptions go away when the bridge is detached or dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, info};

use crate::context::{CallbackRegistry, Subscription};
use crate::error::MidiAccessError;
use crate::event::MidiEvent;
use crate::host::{MidiAccess, MidiInput, MidiListener, RuntimeUnit};

struct MidiPort {
    input: Rc<dyn MidiInput>,
    listeners: CallbackRegistry<[u8]>,
}

impl MidiPort {
    fn subscribe(&self, callback: impl Fn(&[u8]) + 'static) -> Subscription {
        if self.listeners.is_empty() {
            let listeners = self.listeners.clone();
            let forward: MidiListener = Rc::new(move |bytes: &[u8]| listeners.emit(bytes));
            self.input.set_listener(Some(forward));
        }
        self.listeners.subscribe(callback)
    }

    /// Free the host slot once nobody listens.
    fn release(&self) {
        if self.listeners.is_empty() {
            self.input.set_listener(None);
        }
    }
}

/// Process-wide MIDI ports, requested on first use.
pub struct MidiHub {
    access: Rc<dyn MidiAccess>,
    ports: RefCell<Option<Rc<Vec<MidiPort>>>>,
}

impl MidiHub {
    pub fn new(access: Rc<dyn MidiAccess>) -> Self {
        Self {
            access,
            ports: RefCell::new(None),
        }
    }

    /// The shared port list. A failed request is not cached, so the next
    /// attach asks again.
    async fn ports(&self) -> Result<Rc<Vec<MidiPort>>, MidiAccessError> {
        if let Some(ports) = self.ports.borrow().as_ref() {
            return Ok(Rc::clone(ports));
        }

        let inputs = self.access.request().await?;
        if inputs.is_empty() {
            return Err(MidiAccessError::NoInputs);
        }

        // Another session may have finished its request first.
        let mut cached = self.ports.borrow_mut();
        let ports = cached.get_or_insert_with(|| {
            debug!("MIDI access granted, {} input(s)", inputs.len());
            Rc::new(
                inputs
                    .into_iter()
                    .map(|input| MidiPort {
                        input,
                        listeners: CallbackRegistry::new(),
                    })
                    .collect(),
            )
        });
        Ok(Rc::clone(ports))
    }
}

pub struct MidiBridge {
    ports: Rc<Vec<MidiPort>>,
    subscriptions: Vec<Subscription>,
}

impl MidiBridge {
    /// Route every input port to `unit`.
    ///
    /// The listener only holds a weak reference, so a destroyed unit never
    /// receives events even if a port fires late.
    pub async fn attach(hub: &MidiHub, unit: Weak<dyn RuntimeUnit>) -> Result<Self, MidiAccessError> {
        let ports = hub.ports().await?;

        let subscriptions = ports
            .iter()
            .map(|port| {
                let unit = unit.clone();
                port.subscribe(move |bytes| {
                    let Some(unit) = unit.upgrade() else {
                        return;
                    };
                    match MidiEvent::decode(bytes) {
                        Some(event) => event.dispatch(unit.as_ref()),
                        None => debug!("ignoring MIDI message {bytes:02x?}"),
                    }
                })
            })
            .collect();
        info!("MIDI attached on {} input(s)", ports.len());

        Ok(Self {
            ports,
            subscriptions,
        })
    }

    /// Stop forwarding to this bridge's unit.
    pub fn detach(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        self.subscriptions.clear();
        for port in self.ports.iter() {
            port.release();
        }
    }
}

impl Drop for MidiBridge {
    fn drop(&mut self) {
        self.clear();
    }
}
