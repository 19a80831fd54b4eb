//! Player-slot assignment.
//!
//! A session has four fixed slots. Slot One always belongs to the host
//! while the host is running; Two through Four are guest slots handed
//! out to clients. Slot identity is a small integer and that integer is
//! part of the wire format (role tables serialize keyed by it).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NetplayError;
use crate::message::ParticipantId;

// ── PlayerSlot ───────────────────────────────────────────────────

/// One of the four fixed player positions.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerSlot {
    /// The host. Never negotiable.
    One = 0,
    Two = 1,
    Three = 2,
    Four = 3,
}

/// Guest slots, in auto-assignment order.
pub const GUEST_SLOTS: [PlayerSlot; 3] = [PlayerSlot::Two, PlayerSlot::Three, PlayerSlot::Four];

impl PlayerSlot {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_host(self) -> bool {
        self == PlayerSlot::One
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = NetplayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlayerSlot::One),
            1 => Ok(PlayerSlot::Two),
            2 => Ok(PlayerSlot::Three),
            3 => Ok(PlayerSlot::Four),
            _ => Err(NetplayError::UnknownVariant {
                type_name: "PlayerSlot",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", *self as u8 + 1)
    }
}

// ── RoleBinding ──────────────────────────────────────────────────

/// The participant occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    pub participant_id: ParticipantId,
    pub username: String,
    pub nickname: String,
}

impl RoleBinding {
    pub fn new(
        participant_id: ParticipantId,
        username: impl Into<String>,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            participant_id,
            username: username.into(),
            nickname: nickname.into(),
        }
    }

    /// Placeholder that keeps a slot occupied while it is disabled.
    pub fn disabled() -> Self {
        Self::new(0, "", "")
    }

    pub fn is_placeholder(&self) -> bool {
        self.participant_id == 0
    }
}

// ── SlotRequest ──────────────────────────────────────────────────

/// What a client asks for in a `RoleOffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRequest {
    /// Take the lowest-numbered empty guest slot, but only if the
    /// sender holds no slot yet.
    Auto,
    /// Give up whatever slot the sender holds.
    Release,
    /// Take a specific slot if it is empty, releasing any prior one.
    /// Falls back to auto assignment when the seat is unavailable.
    Slot(PlayerSlot),
}

// ── SlotTable ────────────────────────────────────────────────────

/// A serialized slot table, keyed by the slot's numeric value.
pub type SlotSnapshot = BTreeMap<u8, RoleBinding>;

/// Authoritative slot table owned by the host role.
///
/// Invariants: at most one slot per participant; slot One holds the
/// host binding for the table's whole lifetime.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: [Option<RoleBinding>; 4],
}

impl SlotTable {
    /// Create a table with the host bound to slot One.
    pub fn with_host(host: RoleBinding) -> Self {
        let mut slots: [Option<RoleBinding>; 4] = Default::default();
        slots[PlayerSlot::One.index()] = Some(host);
        Self { slots }
    }

    pub fn get(&self, slot: PlayerSlot) -> Option<&RoleBinding> {
        self.slots[slot.index()].as_ref()
    }

    /// The slot currently held by `participant`, if any.
    pub fn slot_of(&self, participant: ParticipantId) -> Option<PlayerSlot> {
        self.slots.iter().enumerate().find_map(|(i, binding)| {
            binding
                .as_ref()
                .filter(|b| !b.is_placeholder() && b.participant_id == participant)
                .and_then(|_| PlayerSlot::try_from(i as u8).ok())
        })
    }

    /// Apply one `RoleOffer` from a guest. Returns `true` when the
    /// table changed. Slot One is never touched.
    pub fn apply_offer(&mut self, binding: RoleBinding, request: SlotRequest) -> bool {
        let held = self.slot_of(binding.participant_id);
        match request {
            SlotRequest::Release => match held {
                Some(slot) if !slot.is_host() => {
                    self.slots[slot.index()] = None;
                    true
                }
                _ => false,
            },
            SlotRequest::Slot(slot) => {
                if slot.is_host() || self.slots[slot.index()].is_some() {
                    // The seat is unavailable; treat the offer as auto
                    // so an unseated sender still lands somewhere.
                    return self.auto_assign(binding, held);
                }
                if let Some(prior) = held {
                    if prior.is_host() {
                        return false;
                    }
                    self.slots[prior.index()] = None;
                }
                self.slots[slot.index()] = Some(binding);
                true
            }
            SlotRequest::Auto => self.auto_assign(binding, held),
        }
    }

    /// Seat an unseated sender in the lowest-numbered empty guest slot.
    fn auto_assign(&mut self, binding: RoleBinding, held: Option<PlayerSlot>) -> bool {
        if held.is_some() {
            return false;
        }
        for slot in GUEST_SLOTS {
            if self.slots[slot.index()].is_none() {
                self.slots[slot.index()] = Some(binding);
                return true;
            }
        }
        false
    }

    /// Remove whatever slot `participant` holds (never slot One's host).
    /// Returns the removed binding.
    pub fn clear_participant(&mut self, participant: ParticipantId) -> Option<RoleBinding> {
        let slot = self.slot_of(participant)?;
        if slot.is_host() {
            return None;
        }
        self.slots[slot.index()].take()
    }

    /// Disable a guest slot (occupied by a placeholder so nobody can
    /// join it) or re-enable it. Disabling evicts the current holder.
    pub fn set_disabled(&mut self, slot: PlayerSlot, disabled: bool) -> bool {
        if slot.is_host() {
            return false;
        }
        let entry = &mut self.slots[slot.index()];
        if disabled {
            *entry = Some(RoleBinding::disabled());
        } else {
            match entry {
                Some(b) if b.is_placeholder() => *entry = None,
                _ => return false,
            }
        }
        true
    }

    /// Wire-format view of the table.
    pub fn snapshot(&self) -> SlotSnapshot {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (i as u8, b.clone())))
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> RoleBinding {
        RoleBinding::new(1, "host", "Host")
    }

    fn guest(id: ParticipantId) -> RoleBinding {
        RoleBinding::new(id, format!("user{id}"), format!("Guest {id}"))
    }

    #[test]
    fn host_occupies_slot_one() {
        let table = SlotTable::with_host(host());
        assert_eq!(table.slot_of(1), Some(PlayerSlot::One));
        assert_eq!(table.get(PlayerSlot::One).unwrap().participant_id, 1);
    }

    #[test]
    fn auto_assigns_lowest_empty_guest_slot() {
        let mut table = SlotTable::with_host(host());
        assert!(table.apply_offer(guest(42), SlotRequest::Auto));
        assert_eq!(table.slot_of(42), Some(PlayerSlot::Two));

        assert!(table.apply_offer(guest(43), SlotRequest::Auto));
        assert_eq!(table.slot_of(43), Some(PlayerSlot::Three));
    }

    #[test]
    fn auto_is_a_no_op_for_seated_participant() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Four));
        assert!(!table.apply_offer(guest(42), SlotRequest::Auto));
        assert_eq!(table.slot_of(42), Some(PlayerSlot::Four));
    }

    #[test]
    fn explicit_request_displaces_own_prior_slot() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Auto);
        assert!(table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Four)));
        assert_eq!(table.slot_of(42), Some(PlayerSlot::Four));
        assert!(table.get(PlayerSlot::Two).is_none());
    }

    #[test]
    fn explicit_request_for_occupied_slot_falls_back_to_auto() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Two));

        // 43 asked for Two, which is taken; it lands in the lowest
        // free guest slot instead of staying seatless.
        assert!(table.apply_offer(guest(43), SlotRequest::Slot(PlayerSlot::Two)));
        assert_eq!(table.slot_of(42), Some(PlayerSlot::Two));
        assert_eq!(table.slot_of(43), Some(PlayerSlot::Three));
    }

    #[test]
    fn occupied_request_from_a_seated_sender_changes_nothing() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Two));
        table.apply_offer(guest(43), SlotRequest::Slot(PlayerSlot::Three));

        // Auto fallback is a no-op for a seated sender.
        assert!(!table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Three)));
        assert_eq!(table.slot_of(42), Some(PlayerSlot::Two));
        assert_eq!(table.slot_of(43), Some(PlayerSlot::Three));
    }

    #[test]
    fn occupied_request_in_a_full_table_is_refused() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Auto);
        table.apply_offer(guest(43), SlotRequest::Auto);
        table.apply_offer(guest(44), SlotRequest::Auto);

        assert!(!table.apply_offer(guest(45), SlotRequest::Slot(PlayerSlot::Two)));
        assert_eq!(table.slot_of(45), None);
    }

    #[test]
    fn slot_one_is_never_negotiable() {
        let mut table = SlotTable::with_host(host());
        assert!(!table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::One)));
        assert!(table.clear_participant(1).is_none());
        assert_eq!(table.slot_of(1), Some(PlayerSlot::One));
    }

    #[test]
    fn release_clears_own_slot() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Auto);
        assert!(table.apply_offer(guest(42), SlotRequest::Release));
        assert_eq!(table.slot_of(42), None);
        // Releasing again changes nothing.
        assert!(!table.apply_offer(guest(42), SlotRequest::Release));
    }

    #[test]
    fn at_most_one_slot_per_participant() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Auto);
        table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Three));
        table.apply_offer(guest(42), SlotRequest::Slot(PlayerSlot::Four));

        let snapshot = table.snapshot();
        let held: Vec<_> = snapshot
            .values()
            .filter(|b| b.participant_id == 42)
            .collect();
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn disabled_slot_blocks_auto_join() {
        let mut table = SlotTable::with_host(host());
        assert!(table.set_disabled(PlayerSlot::Two, true));
        table.apply_offer(guest(42), SlotRequest::Auto);
        assert_eq!(table.slot_of(42), Some(PlayerSlot::Three));

        assert!(table.set_disabled(PlayerSlot::Two, false));
        table.apply_offer(guest(43), SlotRequest::Auto);
        assert_eq!(table.slot_of(43), Some(PlayerSlot::Two));
    }

    #[test]
    fn snapshot_keys_are_slot_numbers() {
        let mut table = SlotTable::with_host(host());
        table.apply_offer(guest(42), SlotRequest::Auto);
        let snapshot = table.snapshot();
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(snapshot[&1].participant_id, 42);
    }
}
