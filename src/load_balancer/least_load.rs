//! Least-load selection strategy.

use crate::load_balancer::slot::ProviderSlot;

/// Pick the slot with the lowest `queued + in-flight` count.
///
/// Ties go to the lowest index: `min_by_key` keeps the first minimum.
pub fn least_loaded(slots: &[ProviderSlot]) -> Option<&ProviderSlot> {
    slots.iter().min_by_key(|slot| slot.load())
}
