// src/context.rs
//
// Process-wide context.
//
// The compiler, audio clock, device cache and MIDI ports exist once per
// process. They are built here at startup and handed to every session
// explicitly, never reached through globals.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::config::SessionConfig;
use crate::error::DeviceAccessError;
use crate::host::{
    AssetFetcher, AudioClock, DeviceDescriptor, DeviceProvider, DspCompiler, FrameScheduler,
    MidiAccess,
};
use crate::midi::MidiHub;

/// The externally provided collaborators a context is built from.
pub struct Host {
    pub compiler: Rc<dyn DspCompiler>,
    pub clock: Rc<dyn AudioClock>,
    pub devices: Rc<dyn DeviceProvider>,
    pub midi: Rc<dyn MidiAccess>,
    pub assets: Rc<dyn AssetFetcher>,
    pub scheduler: Rc<dyn FrameScheduler>,
}

/// Shared state for all sessions in the process.
pub struct Context {
    pub compiler: Rc<dyn DspCompiler>,
    pub clock: Rc<dyn AudioClock>,
    pub midi: MidiHub,
    pub assets: Rc<dyn AssetFetcher>,
    pub scheduler: Rc<dyn FrameScheduler>,
    pub devices: DeviceCache,
    pub config: SessionConfig,
}

impl Context {
    pub fn new(host: Host, config: SessionConfig) -> Rc<Self> {
        Rc::new(Self {
            compiler: host.compiler,
            clock: host.clock,
            midi: MidiHub::new(host.midi),
            assets: host.assets,
            scheduler: host.scheduler,
            devices: DeviceCache::new(host.devices),
            config,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════
// Callback registry
// ═══════════════════════════════════════════════════════════════════

type Callback<T> = Rc<dyn Fn(&T)>;

struct RegistryInner<T: ?Sized> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// Fan-out list of callbacks with explicit unsubscription.
pub struct CallbackRegistry<T: ?Sized> {
    inner: Rc<RefCell<RegistryInner<T>>>,
}

impl<T: ?Sized + 'static> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.callbacks.push((id, Rc::new(callback)));

        let weak: Weak<RefCell<RegistryInner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().callbacks.retain(|(cb_id, _)| *cb_id != id);
                }
            })),
        }
    }

    pub fn emit(&self, value: &T) {
        // Snapshot so callbacks may (un)subscribe while being notified.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .borrow()
            .callbacks
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + 'static> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for CallbackRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Unregisters its callback on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Device cache
// ═══════════════════════════════════════════════════════════════════

/// Cached device list plus hot-plug fan-out.
pub struct DeviceCache {
    provider: Rc<dyn DeviceProvider>,
    devices: Rc<RefCell<Option<Vec<DeviceDescriptor>>>>,
    listeners: CallbackRegistry<Vec<DeviceDescriptor>>,
    watching: Cell<bool>,
}

impl DeviceCache {
    pub fn new(provider: Rc<dyn DeviceProvider>) -> Self {
        Self {
            provider,
            devices: Rc::new(RefCell::new(None)),
            listeners: CallbackRegistry::new(),
            watching: Cell::new(false),
        }
    }

    /// The current device list, enumerating on first use.
    pub async fn devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceAccessError> {
        self.ensure_watching();

        if let Some(devices) = self.devices.borrow().as_ref() {
            return Ok(devices.clone());
        }

        let devices = self.provider.enumerate().await?;
        debug!("enumerated {} media devices", devices.len());
        *self.devices.borrow_mut() = Some(devices.clone());
        Ok(devices)
    }

    /// Be told about hot-plug changes until the subscription is dropped.
    pub fn subscribe(&self, callback: impl Fn(&Vec<DeviceDescriptor>) + 'static) -> Subscription {
        self.ensure_watching();
        self.listeners.subscribe(callback)
    }

    fn ensure_watching(&self) {
        if self.watching.replace(true) {
            return;
        }

        let devices = Rc::downgrade(&self.devices);
        let listeners = self.listeners.clone();
        self.provider.watch(Box::new(move |fresh: Vec<DeviceDescriptor>| {
            let Some(devices) = devices.upgrade() else {
                warn!("device change after cache was dropped");
                return;
            };
            debug!("media devices changed ({} present)", fresh.len());
            *devices.borrow_mut() = Some(fresh.clone());
            listeners.emit(&fresh);
        }));
    }
}
