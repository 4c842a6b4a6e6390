//! The pair of human slots a room holds.
//!
//! Invariants:
//! - at most one occupant per slot,
//! - `claim` never replaces an occupant,
//! - `release_if` only clears a slot still held by the expected occupant,
//!   so a late teardown of an evicted client cannot clear its successor.

use crate::error::RoomError;
use crate::role::Slot;

#[derive(Debug)]
pub struct SlotPair<T> {
    interviewer: Option<T>,
    polee: Option<T>,
}

impl<T> Default for SlotPair<T> {
    fn default() -> Self {
        Self {
            interviewer: None,
            polee: None,
        }
    }
}

impl<T> SlotPair<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, slot: Slot) -> &mut Option<T> {
        match slot {
            Slot::Interviewer => &mut self.interviewer,
            Slot::Polee => &mut self.polee,
        }
    }

    /// Place `occupant` into an empty slot.
    pub fn claim(&mut self, slot: Slot, occupant: T) -> Result<(), RoomError> {
        let entry = self.entry(slot);
        if entry.is_some() {
            return Err(RoomError::SlotOccupied(slot));
        }
        *entry = Some(occupant);
        Ok(())
    }

    pub fn get(&self, slot: Slot) -> Option<&T> {
        match slot {
            Slot::Interviewer => self.interviewer.as_ref(),
            Slot::Polee => self.polee.as_ref(),
        }
    }

    /// Unconditionally empty a slot, returning its occupant.
    pub fn take(&mut self, slot: Slot) -> Option<T> {
        self.entry(slot).take()
    }

    /// Empty a slot only if `is_current` accepts its occupant.
    pub fn release_if<F>(&mut self, slot: Slot, is_current: F) -> Option<T>
    where
        F: FnOnce(&T) -> bool,
    {
        let entry = self.entry(slot);
        if entry.as_ref().is_some_and(is_current) {
            entry.take()
        } else {
            None
        }
    }

    pub fn occupied(&self) -> Vec<Slot> {
        Slot::ALL
            .into_iter()
            .filter(|s| self.get(*s).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.interviewer.is_some() as usize + self.polee.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_rejects_second_occupant() {
        let mut slots = SlotPair::new();
        assert_eq!(slots.claim(Slot::Interviewer, 1), Ok(()));
        assert_eq!(
            slots.claim(Slot::Interviewer, 2),
            Err(RoomError::SlotOccupied(Slot::Interviewer))
        );
        assert_eq!(slots.get(Slot::Interviewer), Some(&1));
        assert_eq!(slots.claim(Slot::Polee, 3), Ok(()));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn release_if_ignores_stale_occupant() {
        let mut slots = SlotPair::new();
        slots.claim(Slot::Polee, 7).unwrap();

        assert_eq!(slots.release_if(Slot::Polee, |c| *c == 6), None);
        assert_eq!(slots.get(Slot::Polee), Some(&7));

        assert_eq!(slots.release_if(Slot::Polee, |c| *c == 7), Some(7));
        assert!(slots.is_empty());
        assert_eq!(slots.release_if(Slot::Polee, |_| true), None);
    }

    #[test]
    fn take_frees_slot_for_reclaim() {
        let mut slots = SlotPair::new();
        slots.claim(Slot::Interviewer, "a").unwrap();
        assert_eq!(slots.take(Slot::Interviewer), Some("a"));
        assert!(slots.claim(Slot::Interviewer, "b").is_ok());
        assert_eq!(slots.occupied(), vec![Slot::Interviewer]);
    }
}
