//! Change notifications published after each committed write

use voltlog_util::BatteryId;

/// A committed change to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Battery inserted together with its creation entry
    BatteryCreated(BatteryId),

    /// Status or cycle count changed, with a matching entry appended
    BatteryUpdated(BatteryId),

    /// Observation entry appended (voltage, note, maintenance); battery fields unchanged
    HistoryAppended(BatteryId),

    /// Battery removed along with its ledger
    BatteryDeleted(BatteryId),

    /// A batch import committed; any battery may have changed
    FleetReconciled,

    /// A category was created, edited or deleted, or memberships changed
    CategoriesChanged,
}

impl ChangeEvent {
    /// The battery this change is about, if it is about exactly one
    pub fn battery_id(&self) -> Option<BatteryId> {
        match self {
            ChangeEvent::BatteryCreated(id)
            | ChangeEvent::BatteryUpdated(id)
            | ChangeEvent::HistoryAppended(id)
            | ChangeEvent::BatteryDeleted(id) => Some(*id),
            ChangeEvent::FleetReconciled | ChangeEvent::CategoriesChanged => None,
        }
    }

    /// Whether battery records may differ after this change
    pub fn affects_batteries(&self) -> bool {
        !matches!(
            self,
            ChangeEvent::HistoryAppended(_) | ChangeEvent::CategoriesChanged
        )
    }

    /// Whether the ledger of `battery_id` may differ after this change
    pub fn affects_history(&self, battery_id: BatteryId) -> bool {
        match self {
            ChangeEvent::FleetReconciled => true,
            ChangeEvent::CategoriesChanged => false,
            _ => self.battery_id() == Some(battery_id),
        }
    }

    /// Whether categories or their battery counts may differ after this change
    pub fn affects_categories(&self) -> bool {
        matches!(
            self,
            ChangeEvent::CategoriesChanged
                | ChangeEvent::BatteryDeleted(_)
                | ChangeEvent::FleetReconciled
        )
    }
}
