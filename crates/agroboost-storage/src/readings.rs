//! Sensor reading time series.
//!
//! Append-only store of immutable measurements. Keys are
//! `{device_id}:{kind}:{timestamp_millis:020}:{suffix}` so that a
//! lexicographic range scan over one (device, kind) pair is chronological;
//! the random suffix keeps two events landing in the same millisecond from
//! colliding. Queries are restricted to the fixed windows the dashboards
//! use (24h / 7d / 30d) and always return newest-first.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// Readings table: key = "{device}:{kind}:{millis:020}:{suffix}", value = Reading (JSON)
const READINGS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("readings");

/// Measurement kind. One reading records exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingKind {
    Humidity,
    Temp,
    Voltage,
    Current,
    Battery,
    WaterLevel,
}

impl ReadingKind {
    /// All kinds, in the order ingestion emits them.
    pub const ALL: &'static [ReadingKind] = &[
        ReadingKind::Battery,
        ReadingKind::WaterLevel,
        ReadingKind::Voltage,
        ReadingKind::Current,
        ReadingKind::Temp,
        ReadingKind::Humidity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Humidity => "humidity",
            Self::Temp => "temp",
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Battery => "battery",
            Self::WaterLevel => "water_level",
        }
    }

    /// Fixed measurement unit for this kind.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Humidity => "%",
            Self::Temp => "°C",
            Self::Voltage => "V",
            Self::Current => "A",
            Self::Battery => "%",
            Self::WaterLevel => "%",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "humidity" => Some(Self::Humidity),
            "temp" => Some(Self::Temp),
            "voltage" => Some(Self::Voltage),
            "current" => Some(Self::Current),
            "battery" => Some(Self::Battery),
            "water_level" => Some(Self::WaterLevel),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed query window. No arbitrary ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingWindow {
    /// Last 24 hours ("24h").
    Day,
    /// Last 7 days ("7d").
    Week,
    /// Last 30 days ("30d").
    Month,
}

impl ReadingWindow {
    /// Parse the query-string form.
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "30d" => Some(Self::Month),
            _ => None,
        }
    }

    /// Window length in hours.
    pub fn hours(&self) -> i64 {
        match self {
            Self::Day => 24,
            Self::Week => 168,
            Self::Month => 720,
        }
    }

    /// The instant the window starts, relative to now.
    pub fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - Duration::hours(self.hours())
    }
}

/// One immutable sensor measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Owning kit.
    pub kit_id: Uuid,
    /// Wire-side device identifier.
    pub device_id: String,
    /// Measurement instant. All readings of one ingestion event share one
    /// exact timestamp.
    pub timestamp: DateTime<Utc>,
    /// Measurement kind.
    #[serde(rename = "type")]
    pub kind: ReadingKind,
    /// Measured value.
    pub value: f64,
    /// Measurement unit, fixed per kind.
    pub unit: String,
}

impl Reading {
    /// Create a reading; the unit follows the kind.
    pub fn new(
        kit_id: Uuid,
        device_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        kind: ReadingKind,
        value: f64,
    ) -> Self {
        Self {
            kit_id,
            device_id: device_id.into(),
            timestamp,
            kind,
            value,
            unit: kind.unit().to_string(),
        }
    }
}

fn series_prefix(device_id: &str, kind: ReadingKind) -> String {
    format!("{}:{}:", device_id, kind.as_str())
}

fn series_key(reading: &Reading) -> String {
    format!(
        "{}:{}:{:020}:{}",
        reading.device_id,
        reading.kind.as_str(),
        reading.timestamp.timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Upper bound for a prefix range scan: the prefix with its trailing ':'
/// bumped to the next byte.
fn prefix_end(prefix: &str) -> String {
    let mut end = prefix.to_string();
    end.pop();
    end.push(';');
    end
}

/// Reading store backed by redb.
pub struct ReadingStore {
    db: Arc<Database>,
}

impl ReadingStore {
    /// Open a reading store under the given data directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let db = Database::create(dir.join("readings.redb"))?;
        Self::init(db)
    }

    /// Create an in-memory reading store for testing.
    pub fn memory() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("readings_{}.redb", Uuid::new_v4().simple()));
        let db = Database::create(path)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(READINGS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append a batch of readings in one write transaction. Appends are
    /// conflict-free by key construction.
    pub fn append_batch(&self, readings: &[Reading]) -> Result<()> {
        if readings.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(READINGS_TABLE)?;
            for reading in readings {
                let key = series_key(reading);
                let json = serde_json::to_string(reading)?;
                table.insert(key.as_str(), json.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Query readings for a device within a fixed window, newest-first.
    /// With `kind = None` all kinds are merged into one newest-first list.
    pub fn query(
        &self,
        device_id: &str,
        kind: Option<ReadingKind>,
        window: ReadingWindow,
    ) -> Result<Vec<Reading>> {
        let cutoff = window.cutoff();
        let mut result = match kind {
            Some(kind) => self.scan_series(device_id, kind, cutoff)?,
            None => {
                let mut merged = Vec::new();
                for kind in ReadingKind::ALL {
                    merged.extend(self.scan_series(device_id, *kind, cutoff)?);
                }
                merged
            }
        };
        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(result)
    }

    /// Resolve the most recent reading per requested kind. Kinds are
    /// resolved independently; a kind with no data is simply absent from
    /// the result. Only when *all* requested kinds are absent does this
    /// return `Error::NotFound`.
    pub fn latest(&self, device_id: &str, kinds: &[ReadingKind]) -> Result<Vec<Reading>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(READINGS_TABLE)?;

        let mut result = Vec::new();
        for kind in kinds {
            let prefix = series_prefix(device_id, *kind);
            let end = prefix_end(&prefix);
            let mut range = table.range::<&str>(prefix.as_str()..end.as_str())?;
            if let Some(entry) = range.next_back() {
                let (_, value) = entry.map_err(|e| Error::Storage(e.to_string()))?;
                result.push(serde_json::from_str(value.value())?);
            }
        }

        if result.is_empty() {
            return Err(Error::NotFound(format!(
                "no sensor data found for device {}",
                device_id
            )));
        }
        Ok(result)
    }

    fn scan_series(
        &self,
        device_id: &str,
        kind: ReadingKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let prefix = series_prefix(device_id, kind);
        let start = format!("{}{:020}", prefix, cutoff.timestamp_millis());
        let end = prefix_end(&prefix);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(READINGS_TABLE)?;

        let mut result = Vec::new();
        for entry in table.range::<&str>(start.as_str()..end.as_str())? {
            let (_, value) = entry.map_err(|e| Error::Storage(e.to_string()))?;
            result.push(serde_json::from_str(value.value())?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device: &str, kind: ReadingKind, value: f64, at: DateTime<Utc>) -> Reading {
        Reading::new(Uuid::new_v4(), device, at, kind, value)
    }

    #[test]
    fn test_window_parsing() {
        assert_eq!(ReadingWindow::from_param("24h"), Some(ReadingWindow::Day));
        assert_eq!(ReadingWindow::from_param("7d"), Some(ReadingWindow::Week));
        assert_eq!(ReadingWindow::from_param("30d"), Some(ReadingWindow::Month));
        assert_eq!(ReadingWindow::from_param("48h"), None);
        assert_eq!(ReadingWindow::Week.hours(), 168);
        assert_eq!(ReadingWindow::Month.hours(), 720);
    }

    #[test]
    fn test_query_newest_first() {
        let store = ReadingStore::memory().unwrap();
        let now = Utc::now();

        let batch: Vec<Reading> = (0..5)
            .map(|i| {
                reading(
                    "AGRO-001",
                    ReadingKind::Battery,
                    50.0 + i as f64,
                    now - Duration::minutes(i),
                )
            })
            .collect();
        store.append_batch(&batch).unwrap();

        let result = store
            .query("AGRO-001", Some(ReadingKind::Battery), ReadingWindow::Day)
            .unwrap();
        assert_eq!(result.len(), 5);
        // Newest first: value 50.0 was stamped at `now`.
        assert_eq!(result[0].value, 50.0);
        assert_eq!(result[4].value, 54.0);
    }

    #[test]
    fn test_window_excludes_old_readings() {
        let store = ReadingStore::memory().unwrap();
        let now = Utc::now();

        store
            .append_batch(&[
                reading("AGRO-001", ReadingKind::Temp, 21.0, now),
                reading("AGRO-001", ReadingKind::Temp, 19.0, now - Duration::hours(30)),
            ])
            .unwrap();

        let day = store
            .query("AGRO-001", Some(ReadingKind::Temp), ReadingWindow::Day)
            .unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].value, 21.0);

        let week = store
            .query("AGRO-001", Some(ReadingKind::Temp), ReadingWindow::Week)
            .unwrap();
        assert_eq!(week.len(), 2);
    }

    #[test]
    fn test_query_all_kinds_merged() {
        let store = ReadingStore::memory().unwrap();
        let now = Utc::now();

        store
            .append_batch(&[
                reading("AGRO-001", ReadingKind::Battery, 80.0, now - Duration::minutes(2)),
                reading("AGRO-001", ReadingKind::Humidity, 55.0, now),
                reading("AGRO-002", ReadingKind::Battery, 10.0, now),
            ])
            .unwrap();

        let result = store.query("AGRO-001", None, ReadingWindow::Day).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].kind, ReadingKind::Humidity);
        assert_eq!(result[1].kind, ReadingKind::Battery);
    }

    #[test]
    fn test_latest_per_kind_independent() {
        let store = ReadingStore::memory().unwrap();
        let now = Utc::now();

        store
            .append_batch(&[
                reading("AGRO-001", ReadingKind::Voltage, 11.8, now - Duration::hours(2)),
                reading("AGRO-001", ReadingKind::Voltage, 12.1, now),
                reading("AGRO-001", ReadingKind::Temp, 24.0, now - Duration::days(3)),
            ])
            .unwrap();

        let result = store
            .latest(
                "AGRO-001",
                &[ReadingKind::Humidity, ReadingKind::Temp, ReadingKind::Voltage],
            )
            .unwrap();

        // Humidity has no data and is simply absent.
        assert_eq!(result.len(), 2);
        let voltage = result.iter().find(|r| r.kind == ReadingKind::Voltage).unwrap();
        assert_eq!(voltage.value, 12.1);
        assert!(result.iter().any(|r| r.kind == ReadingKind::Temp));
    }

    #[test]
    fn test_latest_all_absent_is_not_found() {
        let store = ReadingStore::memory().unwrap();
        let err = store
            .latest("GHOST", &[ReadingKind::Battery, ReadingKind::Temp])
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_units_follow_kind() {
        let r = reading("AGRO-001", ReadingKind::Current, 1.4, Utc::now());
        assert_eq!(r.unit, "A");
        assert_eq!(ReadingKind::Temp.unit(), "°C");
        assert_eq!(ReadingKind::WaterLevel.unit(), "%");
    }
}
