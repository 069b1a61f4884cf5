//! SQLite-based store implementation

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use voltlog_api::{
    palette_color, Battery, BatteryStatus, BatteryType, Category, HistoryEntry, HistoryEvent,
    NewBattery, NewCategory,
};
use voltlog_util::{BatteryId, CategoryId, HistoryEntryId};

use crate::{
    EventBuilder, ImportRecord, InitialState, MembershipChange, ReconcileOutcome, Store,
    StoreError, StoreResult,
};

const BATTERY_COLUMNS: &str = "id, brand, model, serial_number, battery_type, cells, capacity, \
     purchase_date, status, cycle_count, notes";

const ENTRY_COLUMNS: &str = "id, battery_id, timestamp, event_json, notes";

const CATEGORY_SELECT: &str = "SELECT c.id, c.name, c.color, c.icon, c.description, \
     (SELECT COUNT(*) FROM battery_categories m WHERE m.category_id = c.id) \
     FROM categories c";

const BATTERY_ORDER: &str = "ORDER BY brand COLLATE NOCASE, model COLLATE NOCASE, id";

const CATEGORY_ORDER: &str = "ORDER BY c.name COLLATE NOCASE, c.id";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Current state of every battery
            CREATE TABLE IF NOT EXISTS batteries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                brand TEXT NOT NULL CHECK (length(trim(brand)) > 0),
                model TEXT NOT NULL CHECK (length(trim(model)) > 0),
                serial_number TEXT NOT NULL CHECK (length(trim(serial_number)) > 0),
                battery_type TEXT NOT NULL,
                cells INTEGER NOT NULL CHECK (cells > 0),
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                purchase_date TEXT NOT NULL,
                status TEXT NOT NULL,
                cycle_count INTEGER NOT NULL DEFAULT 0 CHECK (cycle_count >= 0),
                notes TEXT NOT NULL DEFAULT ''
            );

            -- History ledger (append-only)
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                battery_id INTEGER NOT NULL REFERENCES batteries(id) ON DELETE CASCADE,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_json TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT ''
            );

            -- Named groups of batteries
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL CHECK (length(trim(name)) > 0),
                color INTEGER NOT NULL,
                icon TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS battery_categories (
                battery_id INTEGER NOT NULL REFERENCES batteries(id) ON DELETE CASCADE,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (battery_id, category_id)
            );

            CREATE TRIGGER IF NOT EXISTS history_append_only
            BEFORE UPDATE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history entries are immutable');
            END;

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_batteries_serial ON batteries(serial_number);
            CREATE INDEX IF NOT EXISTS idx_history_battery ON history(battery_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_battery_categories_category ON battery_categories(category_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn insert_battery(&self, battery: &NewBattery, initial: &InitialState) -> StoreResult<Battery> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let stored = insert_battery_row(&tx, battery, initial)?;
        tx.commit()?;

        debug!(battery_id = %stored.id, serial = %stored.serial_number, "Battery inserted");
        Ok(stored)
    }

    fn get_battery(&self, id: BatteryId) -> StoreResult<Option<Battery>> {
        let conn = self.lock()?;
        select_battery(&conn, id)
    }

    fn find_by_serial(&self, serial_number: &str) -> StoreResult<Option<Battery>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {BATTERY_COLUMNS} FROM batteries WHERE serial_number = ?1 ORDER BY id LIMIT 1"
        );
        Ok(query_batteries(&conn, &sql, params![serial_number])?
            .into_iter()
            .next())
    }

    fn list_batteries(&self, status: Option<BatteryStatus>) -> StoreResult<Vec<Battery>> {
        let conn = self.lock()?;

        match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {BATTERY_COLUMNS} FROM batteries WHERE status = ?1 {BATTERY_ORDER}"
                );
                query_batteries(&conn, &sql, params![status.as_str()])
            }
            None => {
                let sql = format!("SELECT {BATTERY_COLUMNS} FROM batteries {BATTERY_ORDER}");
                query_batteries(&conn, &sql, params![])
            }
        }
    }

    fn delete_battery(&self, id: BatteryId) -> StoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let entries = tx.execute("DELETE FROM history WHERE battery_id = ?1", params![id.get()])?;
        let removed = tx.execute("DELETE FROM batteries WHERE id = ?1", params![id.get()])?;
        tx.commit()?;

        debug!(battery_id = %id, removed = removed > 0, entries, "Battery deleted");
        Ok(removed > 0)
    }

    fn record_event(
        &self,
        id: BatteryId,
        notes: &str,
        build: EventBuilder,
    ) -> StoreResult<Option<(Battery, HistoryEntry)>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(mut battery) = select_battery(&tx, id)? else {
            return Ok(None);
        };

        let event = build(&battery);
        battery.apply(&event);

        tx.execute(
            "UPDATE batteries SET status = ?1, cycle_count = ?2 WHERE id = ?3",
            params![battery.status.as_str(), battery.cycle_count, id.get()],
        )?;
        let entry = append_entry(&tx, id, &event, notes)?;
        tx.commit()?;

        debug!(
            battery_id = %id,
            entry_id = %entry.id,
            event_type = %entry.event_type(),
            "History entry appended"
        );
        Ok(Some((battery, entry)))
    }

    fn history(&self, id: BatteryId) -> StoreResult<Vec<HistoryEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM history WHERE battery_id = ?1 ORDER BY timestamp, id"
        );
        query_entries(&conn, &sql, params![id.get()])
    }

    fn all_history(&self) -> StoreResult<Vec<HistoryEntry>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM history ORDER BY battery_id, timestamp, id");
        query_entries(&conn, &sql, params![])
    }

    fn recent_history(&self, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM history ORDER BY timestamp DESC, id DESC LIMIT ?1"
        );
        query_entries(&conn, &sql, params![limit])
    }

    fn reconcile(
        &self,
        records: &[ImportRecord],
        replace_existing: bool,
    ) -> StoreResult<ReconcileOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if replace_existing {
            let entries = tx.execute("DELETE FROM history", params![])?;
            let batteries = tx.execute("DELETE FROM batteries", params![])?;
            info!(batteries, entries, "Existing fleet cleared for import");
        }

        let mut outcome = ReconcileOutcome::default();
        for record in records {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM batteries WHERE serial_number = ?1)",
                params![record.battery.serial_number],
                |row| row.get(0),
            )?;

            if exists {
                debug!(serial = %record.battery.serial_number, "Serial already present, skipping");
                outcome.skipped += 1;
                continue;
            }

            insert_battery_row(&tx, &record.battery, &record.initial)?;
            outcome.imported += 1;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn insert_category(&self, category: &NewCategory) -> StoreResult<Category> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let color = match category.color {
            Some(color) => color,
            None => {
                let existing: i64 =
                    tx.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
                palette_color(usize::try_from(existing).unwrap_or_default())
            }
        };

        tx.execute(
            "INSERT INTO categories (name, color, icon, description) VALUES (?1, ?2, ?3, ?4)",
            params![category.name, color, category.icon, category.description],
        )?;
        let id = CategoryId::new(tx.last_insert_rowid());
        tx.commit()?;

        debug!(category_id = %id, name = %category.name, "Category inserted");
        Ok(Category {
            id,
            name: category.name.clone(),
            color,
            icon: category.icon.clone(),
            description: category.description.clone(),
            battery_count: 0,
        })
    }

    fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> StoreResult<Option<Category>> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE categories SET name = ?1, color = COALESCE(?2, color), icon = ?3, description = ?4 \
             WHERE id = ?5",
            params![
                category.name,
                category.color,
                category.icon,
                category.description,
                id.get()
            ],
        )?;

        if updated == 0 {
            return Ok(None);
        }
        select_category(&conn, id)
    }

    fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let members = tx.execute(
            "DELETE FROM battery_categories WHERE category_id = ?1",
            params![id.get()],
        )?;
        let removed = tx.execute("DELETE FROM categories WHERE id = ?1", params![id.get()])?;
        tx.commit()?;

        debug!(category_id = %id, removed = removed > 0, members, "Category deleted");
        Ok(removed > 0)
    }

    fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let conn = self.lock()?;
        select_category(&conn, id)
    }

    fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let conn = self.lock()?;
        let sql = format!("{CATEGORY_SELECT} {CATEGORY_ORDER}");
        query_categories(&conn, &sql, params![])
    }

    fn categories_for_battery(&self, battery_id: BatteryId) -> StoreResult<Vec<Category>> {
        let conn = self.lock()?;
        let sql = format!(
            "{CATEGORY_SELECT} JOIN battery_categories bc ON bc.category_id = c.id \
             WHERE bc.battery_id = ?1 {CATEGORY_ORDER}"
        );
        query_categories(&conn, &sql, params![battery_id.get()])
    }

    fn batteries_in_category(&self, id: CategoryId) -> StoreResult<Vec<Battery>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {BATTERY_COLUMNS} FROM batteries WHERE id IN \
             (SELECT battery_id FROM battery_categories WHERE category_id = ?1) {BATTERY_ORDER}"
        );
        query_batteries(&conn, &sql, params![id.get()])
    }

    fn set_membership(
        &self,
        battery_id: BatteryId,
        category_id: CategoryId,
        member: bool,
    ) -> StoreResult<MembershipChange> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(missing) = check_membership_targets(&tx, battery_id, &[category_id])? {
            return Ok(missing);
        }

        let rows = if member {
            tx.execute(
                "INSERT OR IGNORE INTO battery_categories (battery_id, category_id) VALUES (?1, ?2)",
                params![battery_id.get(), category_id.get()],
            )?
        } else {
            tx.execute(
                "DELETE FROM battery_categories WHERE battery_id = ?1 AND category_id = ?2",
                params![battery_id.get(), category_id.get()],
            )?
        };
        tx.commit()?;

        debug!(battery_id = %battery_id, category_id = %category_id, member, changed = rows > 0, "Membership set");
        Ok(MembershipChange::Applied { changed: rows > 0 })
    }

    fn replace_memberships(
        &self,
        battery_id: BatteryId,
        categories: &[CategoryId],
    ) -> StoreResult<MembershipChange> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(missing) = check_membership_targets(&tx, battery_id, categories)? {
            return Ok(missing);
        }

        let mut before = BTreeSet::new();
        {
            let mut stmt =
                tx.prepare("SELECT category_id FROM battery_categories WHERE battery_id = ?1")?;
            let ids = stmt.query_map(params![battery_id.get()], |row| row.get::<_, i64>(0))?;
            for id in ids {
                before.insert(CategoryId::new(id?));
            }
        }
        let after: BTreeSet<CategoryId> = categories.iter().copied().collect();

        tx.execute(
            "DELETE FROM battery_categories WHERE battery_id = ?1",
            params![battery_id.get()],
        )?;
        for category_id in &after {
            tx.execute(
                "INSERT INTO battery_categories (battery_id, category_id) VALUES (?1, ?2)",
                params![battery_id.get(), category_id.get()],
            )?;
        }
        tx.commit()?;

        debug!(battery_id = %battery_id, count = after.len(), "Memberships replaced");
        Ok(MembershipChange::Applied {
            changed: before != after,
        })
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

fn insert_battery_row(
    conn: &Connection,
    battery: &NewBattery,
    initial: &InitialState,
) -> StoreResult<Battery> {
    conn.execute(
        r#"
        INSERT INTO batteries
            (brand, model, serial_number, battery_type, cells, capacity,
             purchase_date, status, cycle_count, notes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            battery.brand,
            battery.model,
            battery.serial_number,
            battery.battery_type.as_str(),
            battery.cells,
            battery.capacity,
            battery.purchase_date.format(DATE_FORMAT).to_string(),
            initial.status.as_str(),
            initial.cycle_count,
            battery.notes,
        ],
    )?;

    let id = BatteryId::new(conn.last_insert_rowid());
    append_entry(conn, id, &HistoryEvent::created(initial.status), &initial.note)?;

    Ok(Battery::from_new(
        id,
        battery.clone(),
        initial.status,
        initial.cycle_count,
    ))
}

/// Append one entry, stamped no earlier than the battery's latest entry
fn append_entry(
    conn: &Connection,
    battery_id: BatteryId,
    event: &HistoryEvent,
    notes: &str,
) -> StoreResult<HistoryEntry> {
    event.validate(notes)?;

    let latest: Option<String> = conn
        .query_row(
            "SELECT timestamp FROM history WHERE battery_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT 1",
            params![battery_id.get()],
            |row| row.get(0),
        )
        .optional()?;

    let mut stamp = format_timestamp(&voltlog_util::now());
    if let Some(latest) = latest
        && latest > stamp
    {
        stamp = latest;
    }

    conn.execute(
        "INSERT INTO history (battery_id, timestamp, event_type, event_json, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            battery_id.get(),
            stamp,
            event.event_type().as_str(),
            serde_json::to_string(event)?,
            notes,
        ],
    )?;

    Ok(HistoryEntry {
        id: HistoryEntryId::new(conn.last_insert_rowid()),
        battery_id,
        timestamp: parse_timestamp(&stamp)?,
        event: event.clone(),
        notes: notes.to_string(),
    })
}

fn select_battery(conn: &Connection, id: BatteryId) -> StoreResult<Option<Battery>> {
    let sql = format!("SELECT {BATTERY_COLUMNS} FROM batteries WHERE id = ?1");
    conn.query_row(&sql, params![id.get()], BatteryRow::from_row)
        .optional()?
        .map(BatteryRow::into_battery)
        .transpose()
}

fn select_category(conn: &Connection, id: CategoryId) -> StoreResult<Option<Category>> {
    let sql = format!("{CATEGORY_SELECT} WHERE c.id = ?1");
    conn.query_row(&sql, params![id.get()], CategoryRow::from_row)
        .optional()?
        .map(CategoryRow::into_category)
        .transpose()
}

fn query_categories(conn: &Connection, sql: &str, params: impl Params) -> StoreResult<Vec<Category>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, CategoryRow::from_row)?;

    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?.into_category()?);
    }
    Ok(categories)
}

/// The first missing battery or category of a membership write, if any
fn check_membership_targets(
    conn: &Connection,
    battery_id: BatteryId,
    categories: &[CategoryId],
) -> StoreResult<Option<MembershipChange>> {
    let row_exists = |sql: &str, id: i64| -> StoreResult<bool> {
        Ok(conn.query_row(sql, params![id], |row| row.get(0))?)
    };

    if !row_exists("SELECT EXISTS(SELECT 1 FROM batteries WHERE id = ?1)", battery_id.get())? {
        return Ok(Some(MembershipChange::BatteryMissing));
    }
    for &category_id in categories {
        if !row_exists("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)", category_id.get())? {
            return Ok(Some(MembershipChange::CategoryMissing(category_id)));
        }
    }
    Ok(None)
}

fn query_batteries(conn: &Connection, sql: &str, params: impl Params) -> StoreResult<Vec<Battery>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, BatteryRow::from_row)?;

    let mut batteries = Vec::new();
    for row in rows {
        batteries.push(row?.into_battery()?);
    }
    Ok(batteries)
}

fn query_entries(conn: &Connection, sql: &str, params: impl Params) -> StoreResult<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, EntryRow::from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

/// UTC with fixed precision, so text order is chronological order
fn format_timestamp(dt: &DateTime<Local>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", s, e)))
}

struct BatteryRow {
    id: i64,
    brand: String,
    model: String,
    serial_number: String,
    battery_type: String,
    cells: i64,
    capacity: i64,
    purchase_date: String,
    status: String,
    cycle_count: i64,
    notes: String,
}

impl BatteryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            brand: row.get(1)?,
            model: row.get(2)?,
            serial_number: row.get(3)?,
            battery_type: row.get(4)?,
            cells: row.get(5)?,
            capacity: row.get(6)?,
            purchase_date: row.get(7)?,
            status: row.get(8)?,
            cycle_count: row.get(9)?,
            notes: row.get(10)?,
        })
    }

    fn into_battery(self) -> StoreResult<Battery> {
        let id = BatteryId::new(self.id);
        let corrupt = |what: String| StoreError::Corrupt(format!("battery {}: {}", id, what));
        let count = |field: &str, value: i64| {
            u32::try_from(value).map_err(|_| corrupt(format!("{} out of range ({})", field, value)))
        };

        Ok(Battery {
            id,
            battery_type: self
                .battery_type
                .parse::<BatteryType>()
                .map_err(|e| corrupt(e.to_string()))?,
            cells: count("cells", self.cells)?,
            capacity: count("capacity", self.capacity)?,
            purchase_date: NaiveDate::parse_from_str(&self.purchase_date, DATE_FORMAT)
                .map_err(|e| corrupt(format!("purchase date: {}", e)))?,
            status: self
                .status
                .parse::<BatteryStatus>()
                .map_err(|e| corrupt(e.to_string()))?,
            cycle_count: count("cycle_count", self.cycle_count)?,
            brand: self.brand,
            model: self.model,
            serial_number: self.serial_number,
            notes: self.notes,
        })
    }
}

struct CategoryRow {
    id: i64,
    name: String,
    color: i64,
    icon: String,
    description: String,
    battery_count: i64,
}

impl CategoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            icon: row.get(3)?,
            description: row.get(4)?,
            battery_count: row.get(5)?,
        })
    }

    fn into_category(self) -> StoreResult<Category> {
        let id = CategoryId::new(self.id);
        let corrupt = |what: String| StoreError::Corrupt(format!("category {}: {}", id, what));

        Ok(Category {
            id,
            color: u32::try_from(self.color)
                .map_err(|_| corrupt(format!("color out of range ({})", self.color)))?,
            battery_count: u32::try_from(self.battery_count)
                .map_err(|_| corrupt(format!("battery count out of range ({})", self.battery_count)))?,
            name: self.name,
            icon: self.icon,
            description: self.description,
        })
    }
}

struct EntryRow {
    id: i64,
    battery_id: i64,
    timestamp: String,
    event_json: String,
    notes: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            battery_id: row.get(1)?,
            timestamp: row.get(2)?,
            event_json: row.get(3)?,
            notes: row.get(4)?,
        })
    }

    fn into_entry(self) -> StoreResult<HistoryEntry> {
        Ok(HistoryEntry {
            id: HistoryEntryId::new(self.id),
            battery_id: BatteryId::new(self.battery_id),
            timestamp: parse_timestamp(&self.timestamp)?,
            event: serde_json::from_str(&self.event_json)?,
            notes: self.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltlog_api::HistoryEventType;

    fn sample(serial: &str, brand: &str, model: &str) -> NewBattery {
        NewBattery {
            brand: brand.into(),
            model: model.into(),
            serial_number: serial.into(),
            battery_type: BatteryType::Lipo,
            cells: 4,
            capacity: 5000,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            notes: String::new(),
        }
    }

    fn insert(store: &SqliteStore, serial: &str) -> Battery {
        store
            .insert_battery(&sample(serial, "DJI", "Mavic 3"), &InitialState::default())
            .unwrap()
    }

    fn discharge() -> EventBuilder {
        Box::new(|battery: &Battery| HistoryEvent::StatusChange {
            previous_status: Some(battery.status),
            new_status: BatteryStatus::Discharged,
        })
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_insert_writes_creation_entry() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");

        assert_eq!(battery.status, BatteryStatus::Charged);
        assert_eq!(battery.cycle_count, 0);
        assert_eq!(store.get_battery(battery.id).unwrap(), Some(battery.clone()));

        let history = store.history(battery.id).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].event.is_creation());
        assert_eq!(history[0].battery_id, battery.id);
    }

    #[test]
    fn test_record_event_updates_battery_and_ledger() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");

        let (updated, entry) = store
            .record_event(battery.id, "after flight", discharge())
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BatteryStatus::Discharged);
        assert_eq!(entry.notes, "after flight");
        assert_eq!(
            entry.event,
            HistoryEvent::StatusChange {
                previous_status: Some(BatteryStatus::Charged),
                new_status: BatteryStatus::Discharged,
            }
        );

        let stored = store.get_battery(battery.id).unwrap().unwrap();
        assert_eq!(stored.status, BatteryStatus::Discharged);

        let history = store.history(battery.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], entry);
        assert!(history[0].timestamp <= history[1].timestamp);
    }

    #[test]
    fn test_record_event_cycle_sets_count() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");

        for _ in 0..3 {
            store
                .record_event(
                    battery.id,
                    "",
                    Box::new(|b: &Battery| HistoryEvent::CycleCompleted {
                        cycle_number: b.cycle_count + 1,
                    }),
                )
                .unwrap();
        }

        let stored = store.get_battery(battery.id).unwrap().unwrap();
        assert_eq!(stored.cycle_count, 3);
        let cycles: Vec<_> = store
            .history(battery.id)
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type() == HistoryEventType::CycleCompleted)
            .collect();
        assert_eq!(cycles.len(), 3);
    }

    #[test]
    fn test_non_finite_voltage_never_reaches_ledger() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");

        let result = store.record_event(
            battery.id,
            "",
            Box::new(|_: &Battery| HistoryEvent::VoltageReading {
                voltage: f64::INFINITY,
            }),
        );
        assert!(matches!(result, Err(StoreError::Rejected(_))));

        assert_eq!(store.history(battery.id).unwrap().len(), 1);
        assert_eq!(store.all_history().unwrap().len(), 1);
    }

    #[test]
    fn test_record_event_missing_battery() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store
            .record_event(BatteryId::new(99), "", discharge())
            .unwrap();
        assert!(result.is_none());
        assert!(store.all_history().unwrap().is_empty());
    }

    #[test]
    fn test_delete_cascades_history() {
        let store = SqliteStore::in_memory().unwrap();
        let keep = insert(&store, "SN001");
        let gone = insert(&store, "SN002");
        store.record_event(gone.id, "", discharge()).unwrap();

        assert!(store.delete_battery(gone.id).unwrap());
        assert!(!store.delete_battery(gone.id).unwrap());

        assert!(store.get_battery(gone.id).unwrap().is_none());
        assert!(store.history(gone.id).unwrap().is_empty());
        assert_eq!(store.history(keep.id).unwrap().len(), 1);
    }

    #[test]
    fn test_list_ordering_and_filter() {
        let store = SqliteStore::in_memory().unwrap();
        let init = InitialState::default();
        store.insert_battery(&sample("A", "Tattu", "R-Line"), &init).unwrap();
        store.insert_battery(&sample("B", "dji", "Mini"), &init).unwrap();
        let c = store.insert_battery(&sample("C", "DJI", "Avata"), &init).unwrap();
        store.record_event(c.id, "", discharge()).unwrap();

        let all = store.list_batteries(None).unwrap();
        let serials: Vec<_> = all.iter().map(|b| b.serial_number.as_str()).collect();
        assert_eq!(serials, vec!["C", "B", "A"]);

        let discharged = store
            .list_batteries(Some(BatteryStatus::Discharged))
            .unwrap();
        assert_eq!(discharged.len(), 1);
        assert_eq!(discharged[0].id, c.id);
        assert!(store
            .list_batteries(Some(BatteryStatus::Storage))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_find_by_serial_returns_lowest_id() {
        let store = SqliteStore::in_memory().unwrap();
        let first = insert(&store, "DUP");
        insert(&store, "DUP");

        assert_eq!(store.find_by_serial("DUP").unwrap().unwrap().id, first.id);
        assert!(store.find_by_serial("dup").unwrap().is_none());
    }

    #[test]
    fn test_recent_history_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let a = insert(&store, "SN001");
        let b = insert(&store, "SN002");
        store.record_event(a.id, "", discharge()).unwrap();

        let recent = store.recent_history(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp >= recent[1].timestamp);
        assert_eq!(store.recent_history(10).unwrap().len(), 3);
        assert!(store.all_history().unwrap().iter().any(|e| e.battery_id == b.id));
    }

    #[test]
    fn test_reconcile_skips_known_serials() {
        let store = SqliteStore::in_memory().unwrap();
        insert(&store, "SN001");

        let records = vec![
            ImportRecord {
                battery: sample("SN001", "DJI", "Mavic 3"),
                initial: InitialState::default(),
            },
            ImportRecord {
                battery: sample("SN002", "DJI", "Mavic 3"),
                initial: InitialState {
                    status: BatteryStatus::Storage,
                    cycle_count: 12,
                    note: "Imported".into(),
                },
            },
        ];

        let outcome = store.reconcile(&records, false).unwrap();
        assert_eq!(outcome, ReconcileOutcome { imported: 1, skipped: 1 });

        let imported = store.find_by_serial("SN002").unwrap().unwrap();
        assert_eq!(imported.status, BatteryStatus::Storage);
        assert_eq!(imported.cycle_count, 12);
        let history = store.history(imported.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notes, "Imported");
    }

    #[test]
    fn test_reconcile_replace_existing() {
        let store = SqliteStore::in_memory().unwrap();
        let old = insert(&store, "SN001");

        let records = vec![ImportRecord {
            battery: sample("SN001", "Tattu", "R-Line"),
            initial: InitialState::default(),
        }];
        let outcome = store.reconcile(&records, true).unwrap();
        assert_eq!(outcome, ReconcileOutcome { imported: 1, skipped: 0 });

        assert!(store.get_battery(old.id).unwrap().is_none());
        let all = store.list_batteries(None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].brand, "Tattu");
        assert_eq!(store.all_history().unwrap().len(), 1);
    }

    #[test]
    fn test_history_rows_are_immutable() {
        let store = SqliteStore::in_memory().unwrap();
        insert(&store, "SN001");

        let conn = store.conn.lock().unwrap();
        let result = conn.execute("UPDATE history SET notes = 'rewritten'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_category_palette_and_counts() {
        let store = SqliteStore::in_memory().unwrap();
        let racing = store.insert_category(&NewCategory::named("Racing")).unwrap();
        let spares = store.insert_category(&NewCategory::named("spares")).unwrap();
        let mut custom = NewCategory::named("Archive");
        custom.color = Some(0xFF000000);
        let archive = store.insert_category(&custom).unwrap();

        assert_eq!(racing.color, palette_color(0));
        assert_eq!(spares.color, palette_color(1));
        assert_eq!(archive.color, 0xFF000000);

        let a = insert(&store, "SN001");
        let b = insert(&store, "SN002");
        for battery in [a.id, b.id] {
            assert_eq!(
                store.set_membership(battery, racing.id, true).unwrap(),
                MembershipChange::Applied { changed: true }
            );
        }
        // Assigning twice is not a change
        assert_eq!(
            store.set_membership(a.id, racing.id, true).unwrap(),
            MembershipChange::Applied { changed: false }
        );

        let names: Vec<_> = store
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.battery_count))
            .collect();
        assert_eq!(
            names,
            vec![("Archive".into(), 0), ("Racing".into(), 2), ("spares".into(), 0)]
        );
        assert_eq!(store.batteries_in_category(racing.id).unwrap().len(), 2);
    }

    #[test]
    fn test_membership_targets_must_exist() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");
        let category = store.insert_category(&NewCategory::named("Racing")).unwrap();
        let ghost = CategoryId::new(77);

        assert_eq!(
            store.set_membership(BatteryId::new(99), category.id, true).unwrap(),
            MembershipChange::BatteryMissing
        );
        assert_eq!(
            store.replace_memberships(battery.id, &[category.id, ghost]).unwrap(),
            MembershipChange::CategoryMissing(ghost)
        );
        assert!(store.categories_for_battery(battery.id).unwrap().is_empty());
    }

    #[test]
    fn test_replace_memberships() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");
        let racing = store.insert_category(&NewCategory::named("Racing")).unwrap();
        let spares = store.insert_category(&NewCategory::named("Spares")).unwrap();

        store.set_membership(battery.id, racing.id, true).unwrap();
        let change = store
            .replace_memberships(battery.id, &[spares.id, spares.id])
            .unwrap();
        assert_eq!(change, MembershipChange::Applied { changed: true });

        let current = store.categories_for_battery(battery.id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, spares.id);

        assert_eq!(
            store.replace_memberships(battery.id, &[spares.id]).unwrap(),
            MembershipChange::Applied { changed: false }
        );
        // Memberships never touch the ledger
        assert_eq!(store.history(battery.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_delete_category() {
        let store = SqliteStore::in_memory().unwrap();
        let battery = insert(&store, "SN001");
        let category = store.insert_category(&NewCategory::named("Racing")).unwrap();
        store.set_membership(battery.id, category.id, true).unwrap();

        let mut edit = NewCategory::named("Race day");
        edit.description = "packs for events".into();
        let updated = store.update_category(category.id, &edit).unwrap().unwrap();
        assert_eq!(updated.name, "Race day");
        assert_eq!(updated.color, category.color);
        assert_eq!(updated.battery_count, 1);
        assert!(store
            .update_category(CategoryId::new(99), &edit)
            .unwrap()
            .is_none());

        assert!(store.delete_category(category.id).unwrap());
        assert!(!store.delete_category(category.id).unwrap());
        assert!(store.categories_for_battery(battery.id).unwrap().is_empty());
        assert!(store.get_battery(battery.id).unwrap().is_some());
    }

    #[test]
    fn test_battery_delete_and_replace_drop_memberships() {
        let store = SqliteStore::in_memory().unwrap();
        let category = store.insert_category(&NewCategory::named("Racing")).unwrap();
        let gone = insert(&store, "SN001");
        let replaced = insert(&store, "SN002");
        store.set_membership(gone.id, category.id, true).unwrap();
        store.set_membership(replaced.id, category.id, true).unwrap();

        store.delete_battery(gone.id).unwrap();
        assert_eq!(store.get_category(category.id).unwrap().unwrap().battery_count, 1);

        store
            .reconcile(
                &[ImportRecord {
                    battery: sample("SN003", "DJI", "Mini"),
                    initial: InitialState::default(),
                }],
                true,
            )
            .unwrap();
        let kept = store.get_category(category.id).unwrap().unwrap();
        assert_eq!(kept.battery_count, 0);
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltlog.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            let battery = insert(&store, "SN001");
            store.record_event(battery.id, "", discharge()).unwrap();
            battery.id
        };

        let store = SqliteStore::open(&path).unwrap();
        let battery = store.get_battery(id).unwrap().unwrap();
        assert_eq!(battery.status, BatteryStatus::Discharged);
        assert_eq!(store.history(id).unwrap().len(), 2);
    }
}
