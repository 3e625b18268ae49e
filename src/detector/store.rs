//! Single-slot stores for the persistent detector records
//!
//! A store exposes exactly two operations, `get` and `set`. There is no
//! compare-and-swap and no read-modify-write primitive: an "increment" is a
//! `get`, a local change, then an unconditional `set`.
//!
//! # Concurrency contract
//!
//! `set` is last-writer-wins with no ordering guarantee across concurrent
//! callers. Two invocations that both read the same value and both write
//! back will silently lose one update. The detector accepts this race; the
//! records are cosmetic and a lost or regressed step only means the user
//! has to type the sequence again.

use parking_lot::RwLock;
use tracing::debug;

use super::error::StoreError;
use super::state::SlotRecord;

/// Persistent table with one logical slot
pub trait SlotStore<T: Copy>: Send + Sync {
    /// Current record, or `None` if the slot was never initialized
    fn get(&self) -> Option<T>;

    /// Overwrite the record (last writer wins)
    fn set(&self, value: T) -> Result<(), StoreError>;
}

/// In-process slot shared by every producer
///
/// Records are kept in their raw layout and decoded on every read. A raw
/// record that does not decode reads as a miss. The lock only guards the
/// copy in and out of the slot; it never spans a caller's read-modify-write
/// sequence.
pub struct SingleSlot<T: SlotRecord> {
    name: &'static str,
    value: RwLock<Option<T::Raw>>,
}

impl<T: SlotRecord> SingleSlot<T> {
    /// Slot initialized with a record, as done at load time
    pub fn new(name: &'static str, initial: T) -> Self {
        Self::from_raw(name, initial.to_raw())
    }

    /// Slot holding a raw record as handed over by its previous owner
    pub fn from_raw(name: &'static str, raw: T::Raw) -> Self {
        Self {
            name,
            value: RwLock::new(Some(raw)),
        }
    }

    /// Slot with no record; reads miss until the first `set`
    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            value: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stored record in its raw layout
    pub fn raw(&self) -> Option<T::Raw> {
        *self.value.read()
    }
}

impl<T: SlotRecord> SlotStore<T> for SingleSlot<T> {
    fn get(&self) -> Option<T> {
        let raw = self.raw()?;
        match T::from_raw(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Treating slot '{}' as uninitialized: {}", self.name, e);
                None
            }
        }
    }

    fn set(&self, value: T) -> Result<(), StoreError> {
        let raw = value.to_raw();
        // Refuse records that would not read back
        T::from_raw(raw)?;
        *self.value.write() = Some(raw);
        Ok(())
    }
}
