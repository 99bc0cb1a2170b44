//! Message hub with weak, generation-counted callback handles.
//!
//! A hub owns its callbacks; a subscriber owns only a [`Subscription`] that
//! points back through a `Weak`. Dropping either side first is safe: a
//! subscription whose hub is gone does nothing on drop, and a stale
//! [`CallbackId`] is rejected by generation mismatch.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback<M> = Box<dyn FnMut(&M)>;

struct Slot<M> {
    generation: u32,
    callback: Option<Callback<M>>,
    live: bool,
}

struct HubInner<M> {
    slots: Vec<Slot<M>>,
    free: Vec<usize>,
}

impl<M> HubInner<M> {
    fn remove(&mut self, id: CallbackId) -> bool {
        match self.slots.get_mut(id.index) {
            Some(slot) if slot.live && slot.generation == id.generation => {
                slot.live = false;
                slot.callback = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                true
            }
            _ => false,
        }
    }
}

/// Identifies one registered callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId {
    index: usize,
    generation: u32,
}

/// Broadcasts messages of type `M` to registered callbacks.
pub struct MessageHub<M> {
    inner: Rc<RefCell<HubInner<M>>>,
}

impl<M> Default for MessageHub<M> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HubInner {
                slots: Vec::new(),
                free: Vec::new(),
            })),
        }
    }
}

impl<M: 'static> std::fmt::Debug for MessageHub<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHub")
            .field("callbacks", &self.num_callbacks())
            .finish()
    }
}

impl<M: 'static> MessageHub<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its raw id.
    pub fn register(&self, callback: impl FnMut(&M) + 'static) -> CallbackId {
        let mut inner = self.inner.borrow_mut();
        let callback: Callback<M> = Box::new(callback);
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index];
            slot.callback = Some(callback);
            slot.live = true;
            CallbackId {
                index,
                generation: slot.generation,
            }
        } else {
            inner.slots.push(Slot {
                generation: 0,
                callback: Some(callback),
                live: true,
            });
            CallbackId {
                index: inner.slots.len() - 1,
                generation: 0,
            }
        }
    }

    /// Register a callback that is removed when the returned guard drops.
    pub fn subscribe(&self, callback: impl FnMut(&M) + 'static) -> Subscription<M> {
        let id = self.register(callback);
        Subscription {
            hub: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Remove a callback. Returns false for stale or unknown ids.
    pub fn unregister(&self, id: CallbackId) -> bool {
        self.inner.borrow_mut().remove(id)
    }

    /// Number of live callbacks.
    pub fn num_callbacks(&self) -> usize {
        self.inner.borrow().slots.iter().filter(|s| s.live).count()
    }

    /// Deliver `msg` to every live callback in registration-slot order.
    ///
    /// Callbacks may register or unregister other callbacks while running.
    pub fn post(&self, msg: &M) {
        let len = self.inner.borrow().slots.len();
        for index in 0..len {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                match inner.slots.get_mut(index) {
                    Some(slot) if slot.live => {
                        let generation = slot.generation;
                        slot.callback.take().map(|cb| (cb, generation))
                    }
                    _ => None,
                }
            };
            let Some((mut callback, generation)) = taken else {
                continue;
            };
            callback(msg);
            let mut inner = self.inner.borrow_mut();
            if let Some(slot) = inner.slots.get_mut(index) {
                if slot.live && slot.generation == generation && slot.callback.is_none() {
                    slot.callback = Some(callback);
                }
            }
        }
    }
}

/// RAII guard for a hub callback.
pub struct Subscription<M> {
    hub: Weak<RefCell<HubInner<M>>>,
    id: CallbackId,
}

impl<M> Subscription<M> {
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// True while the hub is alive and still holds this callback.
    pub fn is_active(&self) -> bool {
        self.hub.upgrade().is_some_and(|inner| {
            inner
                .borrow()
                .slots
                .get(self.id.index)
                .is_some_and(|s| s.live && s.generation == self.id.generation)
        })
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            if let Ok(mut inner) = inner.try_borrow_mut() {
                inner.remove(self.id);
            }
        }
    }
}
