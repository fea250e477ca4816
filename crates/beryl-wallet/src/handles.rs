//! Generation-checked session handles.
//!
//! Callers across the JSON boundary hold an integer, never a pointer. The
//! low 32 bits select a slot, the high 32 bits are the slot's generation;
//! a slot's generation is bumped every time it is freed, so a handle kept
//! after `close` no longer resolves.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::WalletError;
use crate::session::WalletSession;

#[derive(Default)]
struct Slot {
    generation: u32,
    session: Option<Arc<WalletSession>>,
}

/// Open sessions keyed by opaque handle.
#[derive(Default)]
pub struct SessionArena {
    slots: Mutex<Vec<Slot>>,
}

fn pack(index: usize, generation: u32) -> u64 {
    ((generation as u64) << 32) | index as u64
}

fn unpack(handle: u64) -> (usize, u32) {
    ((handle & 0xFFFF_FFFF) as usize, (handle >> 32) as u32)
}

impl SessionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session and return its handle.
    pub fn insert(&self, session: WalletSession) -> u64 {
        let mut slots = self.slots.lock();
        let session = Some(Arc::new(session));
        if let Some(index) = slots.iter().position(|s| s.session.is_none()) {
            slots[index].session = session;
            return pack(index, slots[index].generation);
        }
        slots.push(Slot { generation: 0, session });
        pack(slots.len() - 1, 0)
    }

    /// Resolve a handle.
    pub fn get(&self, handle: u64) -> Result<Arc<WalletSession>, WalletError> {
        let (index, generation) = unpack(handle);
        self.slots
            .lock()
            .get(index)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.session.clone())
            .ok_or(WalletError::InvalidHandle(handle))
    }

    /// Remove a session, invalidating its handle.
    ///
    /// The session itself is dropped, releasing the wallet lock, once the
    /// last in-flight call holding it returns.
    pub fn remove(&self, handle: u64) -> Result<Arc<WalletSession>, WalletError> {
        let (index, generation) = unpack(handle);
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(index)
            .filter(|s| s.generation == generation && s.session.is_some())
            .ok_or(WalletError::InvalidHandle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.session.take().ok_or(WalletError::InvalidHandle(handle))
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.session.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
