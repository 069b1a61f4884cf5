//! Store trait definitions

use voltlog_api::{
    Battery, BatteryStatus, Category, HistoryEntry, HistoryEvent, NewBattery, NewCategory,
};
use voltlog_util::{BatteryId, CategoryId};

use crate::StoreResult;

/// Derives the ledger event for a mutation from the battery's current state.
///
/// Runs inside the store's write transaction, so the state it sees is the
/// state the event is applied to.
pub type EventBuilder = Box<dyn FnOnce(&Battery) -> HistoryEvent + Send>;

/// Main store trait.
///
/// Implementations must apply each battery write together with its history
/// entry as one atomic unit, and must never expose an update or delete of a
/// single history entry.
pub trait Store: Send + Sync {
    // Batteries

    /// Insert a battery and its creation entry
    fn insert_battery(&self, battery: &NewBattery, initial: &InitialState) -> StoreResult<Battery>;

    /// Get a battery by id
    fn get_battery(&self, id: BatteryId) -> StoreResult<Option<Battery>>;

    /// Get the first battery (lowest id) with exactly this serial number
    fn find_by_serial(&self, serial_number: &str) -> StoreResult<Option<Battery>>;

    /// List batteries ordered by brand then model, optionally by status
    fn list_batteries(&self, status: Option<BatteryStatus>) -> StoreResult<Vec<Battery>>;

    /// Delete a battery and its whole history. Returns whether it existed.
    fn delete_battery(&self, id: BatteryId) -> StoreResult<bool>;

    // History ledger

    /// Build an event from the current battery, apply it and append it.
    ///
    /// Returns `None` without writing anything when the battery is absent.
    fn record_event(
        &self,
        id: BatteryId,
        notes: &str,
        build: EventBuilder,
    ) -> StoreResult<Option<(Battery, HistoryEntry)>>;

    /// Entries for one battery, oldest first
    fn history(&self, id: BatteryId) -> StoreResult<Vec<HistoryEntry>>;

    /// Every entry in the ledger, grouped by battery, oldest first
    fn all_history(&self) -> StoreResult<Vec<HistoryEntry>>;

    /// Most recent entries across all batteries, newest first
    fn recent_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>>;

    // Reconciliation

    /// Merge a batch of batteries in one transaction.
    ///
    /// With `replace_existing` the current fleet is removed first. Records
    /// whose serial number is already present are skipped.
    fn reconcile(
        &self,
        records: &[ImportRecord],
        replace_existing: bool,
    ) -> StoreResult<ReconcileOutcome>;

    // Categories

    /// Insert a category. A missing color is taken from the palette.
    fn insert_category(&self, category: &NewCategory) -> StoreResult<Category>;

    /// Replace a category's fields, keeping its color when none is given.
    ///
    /// Returns `None` when the category is absent.
    fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> StoreResult<Option<Category>>;

    /// Delete a category and its memberships. Returns whether it existed.
    fn delete_category(&self, id: CategoryId) -> StoreResult<bool>;

    fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    /// All categories ordered by name, with their battery counts
    fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Categories a battery belongs to, ordered by name
    fn categories_for_battery(&self, battery_id: BatteryId) -> StoreResult<Vec<Category>>;

    /// Batteries in a category, ordered like [`Store::list_batteries`]
    fn batteries_in_category(&self, id: CategoryId) -> StoreResult<Vec<Battery>>;

    /// Add or remove one membership
    fn set_membership(
        &self,
        battery_id: BatteryId,
        category_id: CategoryId,
        member: bool,
    ) -> StoreResult<MembershipChange>;

    /// Replace every membership of a battery in one transaction
    fn replace_memberships(
        &self,
        battery_id: BatteryId,
        categories: &[CategoryId],
    ) -> StoreResult<MembershipChange>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// State a battery starts with, and the note on its creation entry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InitialState {
    pub status: BatteryStatus,
    pub cycle_count: u32,
    pub note: String,
}

/// A validated battery read from an external dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub battery: NewBattery,
    pub initial: InitialState,
}

/// Counts produced by [`Store::reconcile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Result of a membership write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// Memberships now match the request
    Applied { changed: bool },
    BatteryMissing,
    CategoryMissing(CategoryId),
}
