//! Execution context: tracks live objects for bulk cleanup.
//!
//! Objects register themselves when they become live and unregister when
//! they are packed or disposed. [`Context::release_all`] disposes every
//! object still registered. The registry holds objects weakly, so it never
//! keeps one alive.
//!
//! Slots are reused after unregistering; an [`ObjectId`] carries the slot
//! generation so a stale id never unregisters a newer object.

use std::fmt;
use std::sync::{Arc, Weak};

use bon::Builder;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::codec::CodecConfig;

/// An object the context can dispose in bulk.
pub trait Releasable: Send + Sync {
    /// Dispose the object. The context has already forgotten it.
    fn release(&self);
}

/// Handle of a registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    index: usize,
    generation: u64,
}

impl ObjectId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Settings carried by a [`Context`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct ContextConfig {
    /// Codec used when packing and unpacking objects bound to the context.
    #[builder(default)]
    pub codec: CodecConfig,

    /// Label used in log records.
    #[builder(into)]
    pub name: Option<String>,
}

struct Slot {
    generation: u64,
    object: Option<Weak<dyn Releasable>>,
}

#[derive(Default)]
struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl Registry {
    fn insert(&mut self, object: Weak<dyn Releasable>) -> ObjectId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.object = Some(object);
            return ObjectId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        ObjectId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn remove(&mut self, id: ObjectId) -> Option<Weak<dyn Releasable>> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let object = slot.object.take()?;
        slot.generation += 1;
        self.free.push(id.index);
        self.live -= 1;
        Some(object)
    }

    fn drain(&mut self) -> Vec<Weak<dyn Releasable>> {
        let mut objects = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(object) = slot.object.take() {
                slot.generation += 1;
                self.free.push(index);
                objects.push(object);
            }
        }
        self.live = 0;
        objects
    }
}

struct ContextInner {
    config: ContextConfig,
    registry: Mutex<Registry>,
}

/// Shared handle to a registry of live objects.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.inner.config.name)
            .field("live", &self.live_count())
            .finish()
    }
}

impl Context {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    fn name(&self) -> &str {
        self.inner.config.name.as_deref().unwrap_or("unnamed")
    }

    /// Start tracking `object`.
    pub fn register(&self, object: Weak<dyn Releasable>) -> ObjectId {
        let id = self.inner.registry.lock().insert(object);
        trace!(context = self.name(), index = id.index, generation = id.generation, "registered object");
        id
    }

    /// Stop tracking the object behind `id`.
    ///
    /// Returns false for ids that are stale or already unregistered.
    pub fn unregister(&self, id: ObjectId) -> bool {
        let removed = self.inner.registry.lock().remove(id).is_some();
        trace!(context = self.name(), index = id.index, removed, "unregistered object");
        removed
    }

    /// Number of registered objects.
    pub fn live_count(&self) -> usize {
        self.inner.registry.lock().live
    }

    /// Dispose every registered object and return how many were disposed.
    ///
    /// Objects are released outside the registry lock, so their disposal
    /// may call back into the context.
    pub fn release_all(&self) -> usize {
        let objects = self.inner.registry.lock().drain();
        let mut released = 0;
        for object in objects.iter().filter_map(Weak::upgrade) {
            object.release();
            released += 1;
        }
        debug!(context = self.name(), released, "released all objects");
        released
    }

    /// Whether both handles refer to the same registry.
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
