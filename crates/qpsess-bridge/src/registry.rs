//! Typed session registry.
//!
//! Sessions live in a slot table. A [`SessionHandle`] packs the slot index in
//! its low 32 bits and the slot's generation in the high bits, so a handle is
//! an ordinary `i64` the host can carry around. Deleting a session bumps the
//! slot generation; old handles then decode to [`BridgeError::StaleHandle`]
//! instead of reaching whatever session reuses the slot.

use crate::error::{BridgeError, BridgeResult};

/// Integer token naming a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(i64);

impl SessionHandle {
    fn pack(index: usize, generation: u32) -> Self {
        Self((i64::from(generation) << 32) | index as i64)
    }

    /// Reinterprets a raw integer received from the host.
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw integer for the host.
    pub fn raw(self) -> i64 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 & 0xffff_ffff) as usize
    }

    fn generation(self) -> i64 {
        self.0 >> 32
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Slot<T> {
    /// Starts at 1, so no handle is ever zero.
    generation: u32,
    entry: Option<T>,
}

/// Slot table of owned sessions.
#[derive(Debug)]
pub struct SessionRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
    capacity: Option<usize>,
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionRegistry<T> {
    /// An unbounded registry.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            capacity: None,
        }
    }

    /// A registry holding at most `capacity` live sessions.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Stores `entry` and returns its handle.
    pub fn create(&mut self, entry: T) -> BridgeResult<SessionHandle> {
        if let Some(cap) = self.capacity {
            if self.live >= cap {
                return Err(BridgeError::RegistryFull(cap));
            }
        }
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };
        self.live += 1;
        Ok(SessionHandle::pack(index, self.slots[index].generation))
    }

    pub fn get(&self, handle: SessionHandle) -> BridgeResult<&T> {
        let index = self.locate(handle)?;
        self.slots[index]
            .entry
            .as_ref()
            .ok_or(BridgeError::StaleHandle(handle))
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> BridgeResult<&mut T> {
        let index = self.locate(handle)?;
        self.slots[index]
            .entry
            .as_mut()
            .ok_or(BridgeError::StaleHandle(handle))
    }

    /// Removes the session and hands it back to the caller to release.
    pub fn destroy(&mut self, handle: SessionHandle) -> BridgeResult<T> {
        let index = self.locate(handle)?;
        let slot = &mut self.slots[index];
        let entry = slot.entry.take().ok_or(BridgeError::StaleHandle(handle))?;
        slot.generation = next_generation(slot.generation);
        self.free.push(index);
        self.live -= 1;
        Ok(entry)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Removes every live session.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot.entry.take() {
                slot.generation = next_generation(slot.generation);
                self.free.push(index);
                out.push(entry);
            }
        }
        self.live = 0;
        out
    }

    fn locate(&self, handle: SessionHandle) -> BridgeResult<usize> {
        let index = handle.index();
        let slot = self
            .slots
            .get(index)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        let current = i64::from(slot.generation);
        let issued = handle.generation();
        if issued == current {
            Ok(index)
        } else if issued > 0 && issued < current {
            Err(BridgeError::StaleHandle(handle))
        } else {
            Err(BridgeError::InvalidHandle(handle))
        }
    }
}

fn next_generation(generation: u32) -> u32 {
    match generation.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}
