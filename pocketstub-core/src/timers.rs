//! Fixed-capacity timer table.
//!
//! Active entries always occupy a contiguous prefix of the slot array, in
//! insertion order. Removal shifts every later entry one slot down, so the
//! first free slot is always `len` and iteration order is stable.
//!
//! Firing policy: an entry is due when `activation_time < now`. A periodic
//! entry that keeps running is re-armed by adding its period to the previous
//! activation time, not to `now`; a callback that is several periods late is
//! therefore due again on the very next scan until it has caught up.

use core::fmt;

use crate::error::TimerError;

/// Default number of slots, matching the handheld backend.
pub const DEFAULT_TIMER_CAPACITY: usize = 32;

/// Anything that can be scheduled in a [`TimerTable`].
///
/// `fire` receives the timer's period and returns whether the timer should
/// keep running. Returning `false` removes it.
pub trait TimerCallback {
    fn fire(&mut self, period: u32) -> bool;
}

impl<F: FnMut(u32) -> bool> TimerCallback for F {
    #[inline]
    fn fire(&mut self, period: u32) -> bool { self(period) }
}

/// Unique per-table timer identity. Never reused until the `u32` counter wraps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

impl TimerId {
    #[inline]
    pub fn get(self) -> u32 { self.0 }
}

/// Handle returned by [`TimerTable::add`].
///
/// `slot` is where the entry was inserted; compaction may move the entry to a
/// lower slot later, in which case lookup falls back to a scan by `id`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    slot: u8,
    id: TimerId,
}

impl TimerHandle {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn at(slot: usize, id: TimerId) -> Self { Self { slot: slot as u8, id } }

    #[inline]
    pub fn id(self) -> TimerId { self.id }

    /// Pack into a single integer (`slot << 32 | id`), for foreign callers.
    #[inline]
    pub fn to_bits(self) -> u64 { (u64::from(self.slot) << 32) | u64::from(self.id.0) }

    /// Inverse of [`TimerHandle::to_bits`]. Validity is still checked on use.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bits(bits: u64) -> Self {
        Self { slot: (bits >> 32) as u8, id: TimerId(bits as u32) }
    }
}

struct TimerEntry<C> {
    id: TimerId,
    activation_time: u64,
    period: u32,
    callback: C,
}

/// Read-only view of an active entry, yielded by [`TimerTable::iter`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimerView {
    pub handle: TimerHandle,
    pub activation_time: u64,
    pub period: u32,
}

/// Outcome of one [`TimerTable::fire_due`] scan.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FireReport {
    /// Callbacks invoked during the scan.
    pub fired: usize,
    /// Entries removed because they returned `false` or were one-shot.
    pub removed: usize,
}

/// Ordered, fixed-capacity table of scheduled callbacks.
pub struct TimerTable<C, const N: usize = DEFAULT_TIMER_CAPACITY> {
    slots: [Option<TimerEntry<C>>; N],
    len: usize,
    next_id: u32,
}

impl<C: TimerCallback, const N: usize> TimerTable<C, N> {
    pub fn new() -> Self {
        debug_assert!(N <= usize::from(u8::MAX) + 1, "slot index must fit the handle");
        Self { slots: core::array::from_fn(|_| None), len: 0, next_id: 1 }
    }

    #[inline] pub fn len(&self) -> usize { self.len }
    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }
    #[inline] pub fn capacity(&self) -> usize { N }

    /// Schedule `callback` to fire `delay` ms after `now`, re-arming every
    /// `delay` ms while it returns `true`. A zero delay is a one-shot.
    pub fn add(&mut self, now: u64, delay: u32, callback: C) -> Result<TimerHandle, TimerError> {
        self.add_with_period(now, delay, delay, callback)
    }

    /// Schedule with an explicit re-arm interval; `period == 0` fires once.
    pub fn add_with_period(
        &mut self,
        now: u64,
        delay: u32,
        period: u32,
        callback: C,
    ) -> Result<TimerHandle, TimerError> {
        if self.len == N {
            log::warn!("timer table full, rejecting timer (delay {delay} ms)");
            return Err(TimerError::CapacityExceeded { capacity: N });
        }
        let slot = self.len;
        let id = self.allocate_id();
        self.slots[slot] = Some(TimerEntry {
            id,
            activation_time: now + u64::from(delay),
            period,
            callback,
        });
        self.len += 1;
        log::debug!("timer {} armed in slot {slot}: delay {delay} ms, period {period} ms", id.0);
        Ok(TimerHandle::at(slot, id))
    }

    /// Remove a timer and hand back its callback. Later entries shift down one slot.
    pub fn remove(&mut self, handle: TimerHandle) -> Result<C, TimerError> {
        let Some(slot) = self.find(handle) else {
            log::warn!("remove of stale timer handle {}", handle.id().get());
            return Err(TimerError::StaleHandle);
        };
        let callback = self.remove_at(slot).ok_or(TimerError::StaleHandle)?;
        log::debug!("timer {} removed from slot {slot}", handle.id().get());
        Ok(callback)
    }

    /// Whether `handle` still names a live timer.
    #[inline]
    pub fn contains(&self, handle: TimerHandle) -> bool { self.find(handle).is_some() }

    /// Next activation time of a live timer.
    pub fn activation_time(&self, handle: TimerHandle) -> Option<u64> {
        let slot = self.find(handle)?;
        self.slots[slot].as_ref().map(|e| e.activation_time)
    }

    /// Active entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = TimerView> + '_ {
        self.slots[..self.len].iter().enumerate().filter_map(|(slot, e)| {
            e.as_ref().map(|e| TimerView {
                handle: TimerHandle::at(slot, e.id),
                activation_time: e.activation_time,
                period: e.period,
            })
        })
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.len] {
            *slot = None;
        }
        self.len = 0;
    }

    /// One scan over the table: fire every entry whose activation time is
    /// strictly before `now`, in slot order.
    pub fn fire_due(&mut self, now: u64) -> FireReport {
        let mut report = FireReport::default();
        let mut i = 0;
        while i < self.len {
            let Some(entry) = self.slots[i].as_mut() else {
                debug_assert!(false, "hole in active prefix at slot {i}");
                break;
            };
            if entry.activation_time >= now {
                i += 1;
                continue;
            }
            report.fired += 1;
            let keep = entry.callback.fire(entry.period);
            if keep && entry.period > 0 {
                entry.activation_time += u64::from(entry.period);
                i += 1;
            } else {
                // Re-examine slot `i`: it now holds the next entry.
                self.remove_at(i);
                report.removed += 1;
            }
        }
        if report.fired > 0 {
            log::trace!("fire_due({now}): fired {} removed {}", report.fired, report.removed);
        }
        report
    }

    fn allocate_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn find(&self, handle: TimerHandle) -> Option<usize> {
        let hint = usize::from(handle.slot);
        let live = &self.slots[..self.len];
        if live.get(hint).and_then(Option::as_ref).is_some_and(|e| e.id == handle.id) {
            return Some(hint);
        }
        // Compaction only ever moves entries to lower slots.
        live[..hint.min(self.len)]
            .iter()
            .rposition(|e| e.as_ref().is_some_and(|e| e.id == handle.id))
    }

    /// Remove-and-shift: take slot `i`, move every later entry down by one and
    /// clear the vacated trailing slot.
    fn remove_at(&mut self, i: usize) -> Option<C> {
        debug_assert!(i < self.len);
        let entry = self.slots[i].take();
        self.slots[i..self.len].rotate_left(1);
        self.len -= 1;
        entry.map(|e| e.callback)
    }
}

impl<C: TimerCallback, const N: usize> Default for TimerTable<C, N> {
    fn default() -> Self { Self::new() }
}

impl<C, const N: usize> fmt::Debug for TimerTable<C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTable")
            .field("len", &self.len)
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}
