//! Async battery service

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use voltlog_api::{
    Battery, BatteryStatus, Category, HistoryEntry, HistoryEvent, NewBattery, NewCategory,
};
use voltlog_store::{
    EventBuilder, ImportRecord, InitialState, MembershipChange, ReconcileOutcome, Store,
    StoreResult,
};
use voltlog_util::{BatteryId, CategoryId};

use crate::{ChangeEvent, LedgerError, LedgerResult, LiveQuery};

const CHANGE_CHANNEL_CAPACITY: usize = 100;

/// Run a store call on the blocking pool so async callers never wait on I/O
pub(crate) async fn run_blocking<T, F>(store: Arc<dyn Store>, f: F) -> LedgerResult<T>
where
    F: FnOnce(&dyn Store) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || f(&*store)).await?;
    Ok(result?)
}

/// Case-insensitive substring match on brand, model and serial number.
///
/// A blank query matches every battery.
pub fn matches_query(battery: &Battery, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [&battery.brand, &battery.model, &battery.serial_number]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Entry point for every battery operation.
///
/// Each mutation is validated before anything is written, applied together
/// with its ledger entry in one store transaction, and announced on the
/// change channel once committed. Cloning is cheap; clones share the store
/// and the channel.
#[derive(Clone)]
pub struct BatteryService {
    store: Arc<dyn Store>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl BatteryService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { store, changes }
    }

    /// Receive a [`ChangeEvent`] for every committed write from now on
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub(crate) fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is fine
        let _ = self.changes.send(event);
    }

    async fn blocking<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&dyn Store) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(self.store(), f).await
    }

    // Mutations

    /// Add a battery. It starts CHARGED with zero cycles.
    pub async fn create(&self, battery: NewBattery) -> LedgerResult<Battery> {
        battery.validate()?;

        let created = self
            .blocking(move |store| store.insert_battery(&battery, &InitialState::default()))
            .await?;

        info!(
            battery_id = %created.id,
            serial = %created.serial_number,
            battery_type = %created.battery_type,
            "Battery created"
        );
        self.publish(ChangeEvent::BatteryCreated(created.id));
        Ok(created)
    }

    /// Record a status assertion.
    ///
    /// An entry is appended even when the status is unchanged. A missing
    /// battery is a no-op and yields `None`.
    pub async fn update_status(
        &self,
        id: BatteryId,
        status: BatteryStatus,
        notes: &str,
    ) -> LedgerResult<Option<HistoryEntry>> {
        let build: EventBuilder = Box::new(move |battery: &Battery| HistoryEvent::StatusChange {
            previous_status: Some(battery.status),
            new_status: status,
        });

        match self.record(id, notes, build).await? {
            Some(entry) => Ok(Some(entry)),
            None => {
                debug!(battery_id = %id, %status, "Status update for missing battery ignored");
                Ok(None)
            }
        }
    }

    /// Record a voltage reading; the voltage must be finite and positive
    pub async fn record_voltage(
        &self,
        id: BatteryId,
        voltage: f64,
        notes: &str,
    ) -> LedgerResult<HistoryEntry> {
        self.observe(id, HistoryEvent::VoltageReading { voltage }, notes)
            .await
    }

    /// Attach a free-text note
    pub async fn add_note(&self, id: BatteryId, note: &str) -> LedgerResult<HistoryEntry> {
        self.observe(id, HistoryEvent::NoteAdded, note).await
    }

    /// Log a maintenance action
    pub async fn record_maintenance(
        &self,
        id: BatteryId,
        description: &str,
    ) -> LedgerResult<HistoryEntry> {
        self.observe(id, HistoryEvent::Maintenance, description)
            .await
    }

    /// Append an event that does not depend on the battery's current state
    async fn observe(
        &self,
        id: BatteryId,
        event: HistoryEvent,
        notes: &str,
    ) -> LedgerResult<HistoryEntry> {
        event.validate(notes)?;

        let build: EventBuilder = Box::new(move |_: &Battery| event);
        self.record(id, notes, build)
            .await?
            .ok_or(LedgerError::NotFound(id))
    }

    /// Count one more charge cycle
    pub async fn complete_cycle(&self, id: BatteryId, notes: &str) -> LedgerResult<HistoryEntry> {
        let build: EventBuilder = Box::new(|battery: &Battery| HistoryEvent::CycleCompleted {
            cycle_number: battery.cycle_count.saturating_add(1),
        });
        self.record(id, notes, build)
            .await?
            .ok_or(LedgerError::NotFound(id))
    }

    async fn record(
        &self,
        id: BatteryId,
        notes: &str,
        build: EventBuilder,
    ) -> LedgerResult<Option<HistoryEntry>> {
        let notes = notes.to_string();
        let recorded = self
            .blocking(move |store| store.record_event(id, &notes, build))
            .await?;

        let Some((battery, entry)) = recorded else {
            return Ok(None);
        };

        debug!(
            battery_id = %id,
            entry_id = %entry.id,
            event_type = %entry.event_type(),
            status = %battery.status,
            cycle_count = battery.cycle_count,
            "Ledger entry recorded"
        );

        let event = match entry.event {
            HistoryEvent::StatusChange { .. } | HistoryEvent::CycleCompleted { .. } => {
                ChangeEvent::BatteryUpdated(id)
            }
            _ => ChangeEvent::HistoryAppended(id),
        };
        self.publish(event);
        Ok(Some(entry))
    }

    /// Remove a battery and its whole ledger. Returns whether it existed.
    pub async fn delete(&self, id: BatteryId) -> LedgerResult<bool> {
        let removed = self.blocking(move |store| store.delete_battery(id)).await?;

        if removed {
            info!(battery_id = %id, "Battery deleted");
            self.publish(ChangeEvent::BatteryDeleted(id));
        } else {
            debug!(battery_id = %id, "Delete of missing battery ignored");
        }
        Ok(removed)
    }

    /// Merge validated records into the fleet in one transaction
    pub async fn reconcile(
        &self,
        records: Vec<ImportRecord>,
        replace_existing: bool,
    ) -> LedgerResult<ReconcileOutcome> {
        let outcome = self
            .blocking(move |store| store.reconcile(&records, replace_existing))
            .await?;

        info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            replace_existing,
            "Fleet reconciled"
        );
        self.publish(ChangeEvent::FleetReconciled);
        Ok(outcome)
    }

    // Queries

    pub async fn get_by_id(&self, id: BatteryId) -> LedgerResult<Option<Battery>> {
        self.blocking(move |store| store.get_battery(id)).await
    }

    /// First battery (lowest id) with exactly this serial number
    pub async fn get_by_serial(&self, serial_number: &str) -> LedgerResult<Option<Battery>> {
        let serial_number = serial_number.to_string();
        self.blocking(move |store| store.find_by_serial(&serial_number))
            .await
    }

    /// Current fleet, ordered by brand then model, optionally by status
    pub async fn list(&self, status: Option<BatteryStatus>) -> LedgerResult<Vec<Battery>> {
        self.blocking(move |store| store.list_batteries(status)).await
    }

    /// One-shot form of [`BatteryService::search`]
    pub async fn find(&self, query: &str) -> LedgerResult<Vec<Battery>> {
        let query = query.to_string();
        self.blocking(move |store| search_batteries(store, &query))
            .await
    }

    /// Ledger of one battery, oldest first
    pub async fn history(&self, id: BatteryId) -> LedgerResult<Vec<HistoryEntry>> {
        self.blocking(move |store| store.history(id)).await
    }

    /// Every ledger entry, grouped by battery, oldest first
    pub async fn all_history(&self) -> LedgerResult<Vec<HistoryEntry>> {
        self.blocking(|store| store.all_history()).await
    }

    /// Latest entries across the fleet, newest first
    pub async fn recent_history(&self, limit: usize) -> LedgerResult<Vec<HistoryEntry>> {
        self.blocking(move |store| store.recent_history(limit)).await
    }

    // Live queries

    /// Whole fleet, re-emitted after every write that touches a battery
    pub async fn get_all(&self) -> LedgerResult<LiveQuery<Battery>> {
        self.filter_by_status(None).await
    }

    /// Batteries matching `query`, see [`matches_query`]
    pub async fn search(&self, query: &str) -> LedgerResult<LiveQuery<Battery>> {
        let query = query.to_string();
        LiveQuery::spawn(
            self,
            move |store| search_batteries(store, &query),
            ChangeEvent::affects_batteries,
        )
        .await
    }

    /// Batteries with the given status, or all of them for `None`
    pub async fn filter_by_status(
        &self,
        status: Option<BatteryStatus>,
    ) -> LedgerResult<LiveQuery<Battery>> {
        LiveQuery::spawn(
            self,
            move |store| store.list_batteries(status),
            ChangeEvent::affects_batteries,
        )
        .await
    }

    /// Ledger of one battery, re-emitted whenever it grows or is removed
    pub async fn query_by_battery(&self, id: BatteryId) -> LedgerResult<LiveQuery<HistoryEntry>> {
        LiveQuery::spawn(
            self,
            move |store| store.history(id),
            move |event: &ChangeEvent| event.affects_history(id),
        )
        .await
    }

    // Categories

    pub async fn create_category(&self, category: NewCategory) -> LedgerResult<Category> {
        category.validate()?;

        let created = self
            .blocking(move |store| store.insert_category(&category))
            .await?;

        info!(category_id = %created.id, name = %created.name, "Category created");
        self.publish(ChangeEvent::CategoriesChanged);
        Ok(created)
    }

    /// Replace a category's fields; a `None` color keeps the current one
    pub async fn update_category(
        &self,
        id: CategoryId,
        category: NewCategory,
    ) -> LedgerResult<Category> {
        category.validate()?;

        let updated = self
            .blocking(move |store| store.update_category(id, &category))
            .await?
            .ok_or(LedgerError::CategoryNotFound(id))?;

        info!(category_id = %id, name = %updated.name, "Category updated");
        self.publish(ChangeEvent::CategoriesChanged);
        Ok(updated)
    }

    /// Remove a category; its batteries are kept. Returns whether it existed.
    pub async fn delete_category(&self, id: CategoryId) -> LedgerResult<bool> {
        let removed = self.blocking(move |store| store.delete_category(id)).await?;

        if removed {
            info!(category_id = %id, "Category deleted");
            self.publish(ChangeEvent::CategoriesChanged);
        }
        Ok(removed)
    }

    pub async fn get_category(&self, id: CategoryId) -> LedgerResult<Option<Category>> {
        self.blocking(move |store| store.get_category(id)).await
    }

    /// One-shot form of [`BatteryService::categories`]
    pub async fn list_categories(&self) -> LedgerResult<Vec<Category>> {
        self.blocking(|store| store.list_categories()).await
    }

    /// One-shot form of [`BatteryService::categories_for_battery`]
    pub async fn battery_categories(&self, battery_id: BatteryId) -> LedgerResult<Vec<Category>> {
        self.blocking(move |store| store.categories_for_battery(battery_id))
            .await
    }

    /// Batteries in a category, ordered by brand then model
    pub async fn batteries_in_category(&self, id: CategoryId) -> LedgerResult<Vec<Battery>> {
        if self.get_category(id).await?.is_none() {
            return Err(LedgerError::CategoryNotFound(id));
        }
        self.blocking(move |store| store.batteries_in_category(id))
            .await
    }

    /// Put a battery in a category. Returns whether it was not already there.
    pub async fn assign_category(
        &self,
        battery_id: BatteryId,
        category_id: CategoryId,
    ) -> LedgerResult<bool> {
        self.membership(battery_id, move |store| {
            store.set_membership(battery_id, category_id, true)
        })
        .await
    }

    /// Take a battery out of a category. Returns whether it was there.
    pub async fn unassign_category(
        &self,
        battery_id: BatteryId,
        category_id: CategoryId,
    ) -> LedgerResult<bool> {
        self.membership(battery_id, move |store| {
            store.set_membership(battery_id, category_id, false)
        })
        .await
    }

    /// Make `categories` the exact set a battery belongs to.
    ///
    /// Unknown categories reject the whole call and nothing changes.
    pub async fn set_battery_categories(
        &self,
        battery_id: BatteryId,
        categories: Vec<CategoryId>,
    ) -> LedgerResult<bool> {
        self.membership(battery_id, move |store| {
            store.replace_memberships(battery_id, &categories)
        })
        .await
    }

    async fn membership<F>(&self, battery_id: BatteryId, write: F) -> LedgerResult<bool>
    where
        F: FnOnce(&dyn Store) -> StoreResult<MembershipChange> + Send + 'static,
    {
        match self.blocking(write).await? {
            MembershipChange::Applied { changed } => {
                debug!(battery_id = %battery_id, changed, "Category membership written");
                if changed {
                    self.publish(ChangeEvent::CategoriesChanged);
                }
                Ok(changed)
            }
            MembershipChange::BatteryMissing => Err(LedgerError::NotFound(battery_id)),
            MembershipChange::CategoryMissing(id) => Err(LedgerError::CategoryNotFound(id)),
        }
    }

    /// All categories with their battery counts, kept current
    pub async fn categories(&self) -> LedgerResult<LiveQuery<Category>> {
        LiveQuery::spawn(
            self,
            |store| store.list_categories(),
            ChangeEvent::affects_categories,
        )
        .await
    }

    /// Categories of one battery, kept current
    pub async fn categories_for_battery(
        &self,
        battery_id: BatteryId,
    ) -> LedgerResult<LiveQuery<Category>> {
        LiveQuery::spawn(
            self,
            move |store| store.categories_for_battery(battery_id),
            ChangeEvent::affects_categories,
        )
        .await
    }

    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }
}

fn search_batteries(store: &dyn Store, query: &str) -> StoreResult<Vec<Battery>> {
    Ok(store
        .list_batteries(None)?
        .into_iter()
        .filter(|battery| matches_query(battery, query))
        .collect())
}
