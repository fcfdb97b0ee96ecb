//! Live/packed lifecycle of serializable objects.
//!
//! # States
//!
//! ```text
//!            pack                     dispose
//!   LIVE  --------->  PACKED  ------------------>  TERMINATED
//!     ^  <---------     |                              |
//!     |     unpack      |         dispose              |
//!     +-----------------+----------------------------->+
//!     ^                                                |
//!     +------------------ unpack_from -----------------+
//! ```
//!
//! - LIVE: the object is usable through [`Managed::with`] and
//!   [`Managed::with_mut`] and is registered with its [`Context`]
//! - PACKED: only the byte representation exists; accessors fail
//! - TERMINATED: everything is released; only `unpack_from` leaves it
//!
//! [`ObjectState`] implements the transitions as total functions that
//! always return the next state, so a failed pack stays LIVE and a failed
//! unpack stays PACKED with its bytes. [`Managed`] wraps the state in a
//! mutex and keeps the context registration in sync.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::codec::{self, CodecConfig, ObjectKind, ObjectPayload};
use crate::context::{Context, ObjectId, Releasable};
use crate::error::{Error, Result};

const PACKED_ACCESS: &str = "object accessed while packed; unpack it first";
const DISPOSED: &str = "object has been disposed";

/// Objects with a byte representation.
pub trait Serializable: Sized {
    /// Kind recorded in the packed header.
    fn object_kind(&self) -> ObjectKind;

    /// Informational element count recorded in the packed header.
    fn element_count(&self) -> u64 {
        0
    }

    fn to_payload(&self) -> Result<ObjectPayload>;

    fn from_payload(payload: ObjectPayload) -> Result<Self>;
}

/// Lifecycle state of one object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectState<T> {
    Live(T),
    Packed(Vec<u8>),
    Terminated,
}

/// State tag without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    Live,
    Packed,
    Terminated,
}

impl<T: Serializable> ObjectState<T> {
    pub fn status(&self) -> ObjectStatus {
        match self {
            ObjectState::Live(_) => ObjectStatus::Live,
            ObjectState::Packed(_) => ObjectStatus::Packed,
            ObjectState::Terminated => ObjectStatus::Terminated,
        }
    }

    /// LIVE -> PACKED. On failure the object stays LIVE.
    pub fn pack(self, config: &CodecConfig) -> (Self, Result<()>) {
        match self {
            ObjectState::Live(object) => match codec::to_bytes(&object, config) {
                Ok(bytes) => (ObjectState::Packed(bytes), Ok(())),
                Err(err) => (ObjectState::Live(object), Err(err)),
            },
            packed @ ObjectState::Packed(_) => {
                (packed, Err(Error::IllegalState("object is already packed")))
            }
            ObjectState::Terminated => (ObjectState::Terminated, Err(Error::IllegalState(DISPOSED))),
        }
    }

    /// PACKED -> LIVE. On failure the object stays PACKED; LIVE is left
    /// as is.
    pub fn unpack(self, config: &CodecConfig) -> (Self, Result<()>) {
        match self {
            ObjectState::Packed(bytes) => match codec::from_bytes::<T>(&bytes, config) {
                Ok(object) => (ObjectState::Live(object), Ok(())),
                Err(err) => (ObjectState::Packed(bytes), Err(err)),
            },
            live @ ObjectState::Live(_) => (live, Ok(())),
            ObjectState::Terminated => (ObjectState::Terminated, Err(Error::IllegalState(DISPOSED))),
        }
    }

    /// Any state -> TERMINATED.
    pub fn dispose(self) -> Self {
        ObjectState::Terminated
    }

    pub fn live(&self) -> Result<&T> {
        match self {
            ObjectState::Live(object) => Ok(object),
            ObjectState::Packed(_) => Err(Error::IllegalState(PACKED_ACCESS)),
            ObjectState::Terminated => Err(Error::IllegalState(DISPOSED)),
        }
    }

    pub fn live_mut(&mut self) -> Result<&mut T> {
        match self {
            ObjectState::Live(object) => Ok(object),
            ObjectState::Packed(_) => Err(Error::IllegalState(PACKED_ACCESS)),
            ObjectState::Terminated => Err(Error::IllegalState(DISPOSED)),
        }
    }
}

// =============================================================================
// Managed
// =============================================================================

struct Binding {
    context: Context,
    id: ObjectId,
}

struct Slot<T> {
    state: ObjectState<T>,
    binding: Option<Binding>,
}

impl<T> Slot<T> {
    fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.context.unregister(binding.id);
        }
    }

    fn codec(&self) -> CodecConfig {
        self.binding
            .as_ref()
            .map(|b| b.context.config().codec.clone())
            .unwrap_or_default()
    }
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
}

impl<T: Send> Releasable for Inner<T> {
    fn release(&self) {
        let mut slot = self.slot.lock();
        // the context has already dropped the registration
        slot.binding = None;
        slot.state = ObjectState::Terminated;
        debug!("object released by context");
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.slot.get_mut().unbind();
    }
}

/// Shared handle to a serializable object and its lifecycle state.
///
/// Lifecycle operations on one object are serialized by a mutex. Clones
/// share the object.
pub struct Managed<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Serializable + Send + 'static> Managed<T> {
    /// Live object registered with `ctx`.
    pub fn new(object: T, ctx: &Context) -> Self {
        let managed = Self::with_state(ObjectState::Live(object));
        managed.bind(&mut managed.inner.slot.lock(), ctx);
        managed
    }

    /// Packed object that belongs to no context until unpacked.
    pub fn from_packed(bytes: Vec<u8>) -> Self {
        Self::with_state(ObjectState::Packed(bytes))
    }

    fn with_state(state: ObjectState<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    state,
                    binding: None,
                }),
            }),
        }
    }

    fn bind(&self, slot: &mut Slot<T>, ctx: &Context) {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let id = ctx.register(weak);
        slot.binding = Some(Binding {
            context: ctx.clone(),
            id,
        });
    }

    pub fn status(&self) -> ObjectStatus {
        self.inner.slot.lock().state.status()
    }

    /// Context the object is registered with, if live.
    pub fn context(&self) -> Option<Context> {
        self.inner.slot.lock().binding.as_ref().map(|b| b.context.clone())
    }

    /// Convert to bytes and drop the live state.
    ///
    /// Uses the codec of the object's context. On failure the object stays
    /// live and registered.
    pub fn pack(&self) -> Result<()> {
        let mut slot = self.inner.slot.lock();
        let config = slot.codec();
        let state = std::mem::replace(&mut slot.state, ObjectState::Terminated);
        let (state, result) = state.pack(&config);
        slot.state = state;
        match &result {
            Ok(()) => {
                slot.unbind();
                debug!(status = ?slot.state.status(), "object packed");
            }
            Err(err) => debug!(error = %err, "pack failed"),
        }
        result
    }

    /// Rebuild the live object within `ctx`.
    ///
    /// A live object only moves its registration to `ctx`. On decoding
    /// failure the object stays packed with its bytes.
    pub fn unpack(&self, ctx: &Context) -> Result<()> {
        let mut slot = self.inner.slot.lock();
        let state = std::mem::replace(&mut slot.state, ObjectState::Terminated);
        let (state, result) = state.unpack(&ctx.config().codec);
        slot.state = state;
        match &result {
            Ok(()) => {
                let rebind = slot
                    .binding
                    .as_ref()
                    .map_or(true, |b| !b.context.same_as(ctx));
                if rebind {
                    slot.unbind();
                    self.bind(&mut slot, ctx);
                }
                debug!("object unpacked");
            }
            Err(err) => debug!(error = %err, "unpack failed"),
        }
        result
    }

    /// Revive a disposed object from a retained byte sequence.
    pub fn unpack_from(&self, bytes: &[u8], ctx: &Context) -> Result<()> {
        let mut slot = self.inner.slot.lock();
        if slot.state.status() != ObjectStatus::Terminated {
            return Err(Error::IllegalState("unpack_from requires a disposed object"));
        }
        let object = codec::from_bytes::<T>(bytes, &ctx.config().codec)?;
        slot.state = ObjectState::Live(object);
        self.bind(&mut slot, ctx);
        debug!("object unpacked from retained bytes");
        Ok(())
    }

    /// Release everything. Disposing twice is a no-op.
    pub fn dispose(&self) {
        let mut slot = self.inner.slot.lock();
        if slot.state.status() == ObjectStatus::Terminated {
            return;
        }
        let state = std::mem::replace(&mut slot.state, ObjectState::Terminated);
        slot.state = state.dispose();
        slot.unbind();
        debug!("object disposed");
    }

    /// Run `f` on the live object.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let slot = self.inner.slot.lock();
        Ok(f(slot.state.live()?))
    }

    /// Run `f` on the live object with mutable access.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut slot = self.inner.slot.lock();
        Ok(f(slot.state.live_mut()?))
    }

    /// Copy of the packed bytes, if packed.
    pub fn packed_bytes(&self) -> Option<Vec<u8>> {
        match &self.inner.slot.lock().state {
            ObjectState::Packed(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::NumericTable;
    use crate::context::ContextConfig;
    use crate::table::HomogenTable;

    fn table() -> HomogenTable {
        HomogenTable::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], 2, 2).unwrap()
    }

    #[test]
    fn state_transitions_are_total() {
        let state = ObjectState::Live(table());
        let (state, result) = state.pack(&CodecConfig::default());
        assert!(result.is_ok());
        assert_eq!(state.status(), ObjectStatus::Packed);
        assert!(matches!(state.live(), Err(Error::IllegalState(PACKED_ACCESS))));

        let (state, result) = state.pack(&CodecConfig::default());
        assert!(matches!(result, Err(Error::IllegalState(_))));
        assert_eq!(state.status(), ObjectStatus::Packed);

        let (state, result) = state.unpack(&CodecConfig::default());
        assert!(result.is_ok());
        assert_eq!(state.live().unwrap().n_rows(), 2);

        let state = state.dispose();
        let (state, result) = state.unpack(&CodecConfig::default());
        assert!(matches!(result, Err(Error::IllegalState(DISPOSED))));
        assert_eq!(state.status(), ObjectStatus::Terminated);
    }

    #[test]
    fn failed_unpack_keeps_bytes() {
        let state: ObjectState<HomogenTable> = ObjectState::Packed(b"garbage".to_vec());
        let (state, result) = state.unpack(&CodecConfig::default());
        assert!(matches!(result, Err(Error::Deserialize(_))));
        assert_eq!(state, ObjectState::Packed(b"garbage".to_vec()));
    }

    #[test]
    fn managed_registration_follows_state() {
        let ctx = Context::default();
        let object = Managed::new(table(), &ctx);
        assert_eq!(ctx.live_count(), 1);

        object.pack().unwrap();
        assert_eq!(ctx.live_count(), 0);
        assert!(object.context().is_none());

        let other = Context::new(ContextConfig::builder().name("other").build());
        object.unpack(&other).unwrap();
        assert_eq!(other.live_count(), 1);
        assert!(object.context().unwrap().same_as(&other));

        object.unpack(&ctx).unwrap();
        assert_eq!((ctx.live_count(), other.live_count()), (1, 0));

        object.dispose();
        object.dispose();
        assert_eq!(ctx.live_count(), 0);
        assert_eq!(object.status(), ObjectStatus::Terminated);
    }

    #[test]
    fn release_all_terminates_objects() {
        let ctx = Context::default();
        let a = Managed::new(table(), &ctx);
        let b = Managed::new(table(), &ctx);
        b.pack().unwrap();
        assert_eq!(ctx.release_all(), 1);
        assert_eq!(a.status(), ObjectStatus::Terminated);
        assert_eq!(b.status(), ObjectStatus::Packed);
        assert!(matches!(a.with(|t| t.n_rows()), Err(Error::IllegalState(DISPOSED))));
    }

    #[test]
    fn dropping_last_handle_unregisters() {
        let ctx = Context::default();
        let object = Managed::new(table(), &ctx);
        let clone = object.clone();
        drop(object);
        assert_eq!(ctx.live_count(), 1);
        drop(clone);
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn unpack_from_revives_disposed_object() {
        let ctx = Context::default();
        let object = Managed::new(table(), &ctx);
        object.pack().unwrap();
        let bytes = object.packed_bytes().unwrap();

        assert!(matches!(object.unpack_from(&bytes, &ctx), Err(Error::IllegalState(_))));
        object.dispose();
        object.unpack_from(&bytes, &ctx).unwrap();
        assert_eq!(object.with(|t| t.value::<f64>(1, 1).unwrap()).unwrap(), 4.0);
        assert_eq!(ctx.live_count(), 1);
    }

    #[test]
    fn from_packed_binds_on_unpack() {
        let bytes = codec::to_bytes(&table(), &CodecConfig::default()).unwrap();
        let object: Managed<HomogenTable> = Managed::from_packed(bytes);
        assert!(object.context().is_none());
        let ctx = Context::default();
        object.unpack(&ctx).unwrap();
        object
            .with_mut(|t| t.set_value(0, 0, 10.0f64))
            .unwrap()
            .unwrap();
        assert_eq!(object.with(|t| t.read_rows::<f64>(0, 1).unwrap()).unwrap(), vec![10.0, 2.0]);
    }
}
