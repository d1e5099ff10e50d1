//! Kit (device aggregate) storage.
//!
//! One document per physical irrigation controller, keyed by its uuid and
//! indexed by the immutable wire-side `device_id`.
//!
//! Concurrency contract: there is no optimistic-concurrency token on the
//! kit document. Concurrent updates to the same kit are last-write-wins at
//! the granularity of whole committed patches: each write transaction
//! applies all fields supplied in its own patch atomically relative to
//! itself, and whichever transaction commits last overwrites nothing more
//! than the fields it carries. redb serializes write transactions, so a
//! `apply_patch` read-modify-write never observes a torn document.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// Kits table: key = kit id (uuid), value = Kit (serialized as JSON)
const KITS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("kits");

// Device index: key = device_id, value = kit id
const DEVICE_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("kits_by_device");

/// An inert irrigation schedule record. Stored on the kit document; no
/// execution engine consumes these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrrigationSchedule {
    /// Scheduled start time.
    pub start_time: DateTime<Utc>,
    /// Duration in minutes (>= 1).
    pub duration_minutes: u32,
    /// Days of the week the schedule applies to.
    #[serde(default)]
    pub days_of_week: Vec<String>,
    /// Optional humidity threshold.
    #[serde(default)]
    pub threshold_humidity: Option<f64>,
    /// Whether the schedule is active.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A physical irrigation controller ("kit").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kit {
    /// Primary identifier.
    pub id: Uuid,
    /// Immutable, globally unique wire-side identifier.
    pub device_id: String,
    /// Owning user.
    pub owner_id: Uuid,
    /// Human-readable location label.
    #[serde(default)]
    pub location: String,
    /// Pump relay state.
    pub pump_status: bool,
    /// Battery level in percent. Clamped to [0, 100] by device convention,
    /// not enforced at this boundary.
    pub battery_level: f64,
    /// Water tank level in percent. Same convention as `battery_level`.
    pub water_level: f64,
    /// Supply voltage in volts.
    pub voltage: f64,
    /// Pump current draw in amperes.
    pub current: f64,
    /// Inert schedule records.
    #[serde(default)]
    pub irrigation_schedules: Vec<IrrigationSchedule>,
    /// Provisioning timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Kit {
    /// Create a freshly provisioned kit with default levels.
    pub fn new(device_id: impl Into<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            owner_id,
            location: String::new(),
            pump_status: false,
            battery_level: 100.0,
            water_level: 100.0,
            voltage: 0.0,
            current: 0.0,
            irrigation_schedules: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the location label.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Field-level patch applied to a kit by one ingestion event or manual
/// action. Only supplied fields are overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KitPatch {
    pub battery_level: Option<f64>,
    pub water_level: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub pump_status: Option<bool>,
}

impl KitPatch {
    /// True when the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.battery_level.is_none()
            && self.water_level.is_none()
            && self.voltage.is_none()
            && self.current.is_none()
            && self.pump_status.is_none()
    }

    /// Overwrite the supplied fields on `kit`, leaving the rest untouched.
    pub fn apply(&self, kit: &mut Kit) {
        if let Some(v) = self.battery_level {
            kit.battery_level = v;
        }
        if let Some(v) = self.water_level {
            kit.water_level = v;
        }
        if let Some(v) = self.voltage {
            kit.voltage = v;
        }
        if let Some(v) = self.current {
            kit.current = v;
        }
        if let Some(v) = self.pump_status {
            kit.pump_status = v;
        }
    }
}

/// Kit store backed by redb.
pub struct KitStore {
    db: Arc<Database>,
}

impl KitStore {
    /// Open a kit store under the given data directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db = Database::create(dir.join("kits.redb"))?;
        Self::init(db)
    }

    /// Create an in-memory kit store for testing.
    pub fn memory() -> Result<Self> {
        // redb has no true in-memory mode; use a unique temp file.
        let path = std::env::temp_dir().join(format!("kits_{}.redb", Uuid::new_v4().simple()));
        let db = Database::create(path)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(KITS_TABLE)?;
            write_txn.open_table(DEVICE_INDEX_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert a newly provisioned kit. The `device_id` must be unique.
    pub fn insert(&self, kit: &Kit) -> Result<()> {
        let id = kit.id.to_string();
        let json = serde_json::to_string(kit)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut index = write_txn.open_table(DEVICE_INDEX_TABLE)?;
            let taken = index.get(kit.device_id.as_str())?.is_some();
            if taken {
                return Err(Error::InvalidInput(format!(
                    "device id already registered: {}",
                    kit.device_id
                )));
            }
            index.insert(kit.device_id.as_str(), id.as_str())?;

            let mut kits = write_txn.open_table(KITS_TABLE)?;
            kits.insert(id.as_str(), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a kit by its primary id.
    pub fn get(&self, id: Uuid) -> Result<Option<Kit>> {
        let read_txn = self.db.begin_read()?;
        let kits = read_txn.open_table(KITS_TABLE)?;
        let json = kits
            .get(id.to_string().as_str())?
            .map(|v| v.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get a kit by its wire-side device id.
    pub fn get_by_device_id(&self, device_id: &str) -> Result<Option<Kit>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DEVICE_INDEX_TABLE)?;
        let id = index.get(device_id)?.map(|v| v.value().to_string());
        let id = match id {
            Some(id) => id,
            None => return Ok(None),
        };
        let kits = read_txn.open_table(KITS_TABLE)?;
        let json = kits.get(id.as_str())?.map(|v| v.value().to_string());
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Get a kit by id, scoped to its owner. Returns `None` for a kit that
    /// exists but belongs to someone else.
    pub fn get_for_owner(&self, owner_id: Uuid, kit_id: Uuid) -> Result<Option<Kit>> {
        Ok(self.get(kit_id)?.filter(|kit| kit.owner_id == owner_id))
    }

    /// List all kits belonging to an owner.
    pub fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Kit>> {
        let read_txn = self.db.begin_read()?;
        let kits = read_txn.open_table(KITS_TABLE)?;

        let mut result = Vec::new();
        for entry in kits.iter()? {
            let (_, value) = entry.map_err(|e| Error::Storage(e.to_string()))?;
            let kit: Kit = serde_json::from_str(value.value())?;
            if kit.owner_id == owner_id {
                result.push(kit);
            }
        }
        Ok(result)
    }

    /// Overwrite a kit document with the caller's copy.
    pub fn update(&self, kit: &Kit) -> Result<()> {
        let id = kit.id.to_string();
        let json = serde_json::to_string(kit)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut kits = write_txn.open_table(KITS_TABLE)?;
            kits.insert(id.as_str(), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Apply a field-level patch to the kit identified by `device_id` in a
    /// single write transaction, stamping `updated_at` with the event
    /// timestamp. Fields absent from the patch retain their prior values.
    /// Returns the updated kit, or `None` (with nothing written) when the
    /// device id is unknown.
    pub fn apply_patch(
        &self,
        device_id: &str,
        patch: &KitPatch,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Kit>> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let index = write_txn.open_table(DEVICE_INDEX_TABLE)?;
            let id = index.get(device_id)?.map(|v| v.value().to_string());
            drop(index);

            match id {
                None => None,
                Some(id) => {
                    let mut kits = write_txn.open_table(KITS_TABLE)?;
                    let json = kits.get(id.as_str())?.map(|v| v.value().to_string());
                    let json = json.ok_or_else(|| {
                        Error::Storage(format!("kit index points at missing document: {}", id))
                    })?;

                    let mut kit: Kit = serde_json::from_str(&json)?;
                    patch.apply(&mut kit);
                    kit.updated_at = timestamp;

                    let json = serde_json::to_string(&kit)?;
                    kits.insert(id.as_str(), json.as_str())?;
                    Some(kit)
                }
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let store = KitStore::memory().expect("failed to create store");
        let owner = Uuid::new_v4();
        let kit = Kit::new("AGRO-001", owner).with_location("North field");

        store.insert(&kit).expect("insert failed");

        let by_id = store.get(kit.id).unwrap().expect("kit missing by id");
        assert_eq!(by_id.device_id, "AGRO-001");
        assert_eq!(by_id.location, "North field");
        assert_eq!(by_id.battery_level, 100.0);
        assert!(!by_id.pump_status);

        let by_device = store
            .get_by_device_id("AGRO-001")
            .unwrap()
            .expect("kit missing by device id");
        assert_eq!(by_device.id, kit.id);
    }

    #[test]
    fn test_duplicate_device_id_rejected() {
        let store = KitStore::memory().unwrap();
        store.insert(&Kit::new("AGRO-001", Uuid::new_v4())).unwrap();

        let err = store
            .insert(&Kit::new("AGRO-001", Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_apply_patch_is_partial() {
        let store = KitStore::memory().unwrap();
        let kit = Kit::new("AGRO-002", Uuid::new_v4());
        store.insert(&kit).unwrap();

        let now = Utc::now();
        let patch = KitPatch {
            battery_level: Some(42.0),
            ..Default::default()
        };
        let updated = store
            .apply_patch("AGRO-002", &patch, now)
            .unwrap()
            .expect("patch should find the kit");

        assert_eq!(updated.battery_level, 42.0);
        // Untouched fields keep their prior values.
        assert_eq!(updated.water_level, 100.0);
        assert_eq!(updated.voltage, 0.0);
        assert!(!updated.pump_status);
        assert_eq!(updated.updated_at, now);
    }

    #[test]
    fn test_apply_patch_unknown_device() {
        let store = KitStore::memory().unwrap();
        let patch = KitPatch {
            battery_level: Some(10.0),
            ..Default::default()
        };
        let result = store.apply_patch("GHOST", &patch, Utc::now()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_owner_scoping() {
        let store = KitStore::memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let kit = Kit::new("AGRO-003", alice);
        store.insert(&kit).unwrap();

        assert!(store.get_for_owner(alice, kit.id).unwrap().is_some());
        assert!(store.get_for_owner(bob, kit.id).unwrap().is_none());

        assert_eq!(store.list_for_owner(alice).unwrap().len(), 1);
        assert!(store.list_for_owner(bob).unwrap().is_empty());
    }
}
