//! Persistent reference-data cache: three datasets, each tagged with the
//! timestamp of its last refresh.
//!
//! Every dataset serializes to a single JSON document bundling records
//! and timestamp, replaced through a temp file + rename, so the two
//! always commit together. The cache also owns the in-memory working
//! set; the fare engine only ever reads it, and only the loader and the
//! explicit clear-all path mutate it.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Location, RouteEntry, SurchargeRule};

const APP_QUALIFIER: &str = "br";
const APP_ORG: &str = "Mobilidade";
const APP_NAME: &str = "Mobilidade";

/// One of the three reference collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dataset {
    Locations,
    Routes,
    Surcharges,
}

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Locations, Dataset::Routes, Dataset::Surcharges];

    fn file_name(&self) -> &'static str {
        match self {
            Self::Locations => "localidades.json",
            Self::Routes => "rotas.json",
            Self::Surcharges => "adicionais.json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Locations => "localidades",
            Self::Routes => "rotas",
            Self::Surcharges => "adicionais",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// On-disk shape: the records and their timestamp are one document.
#[derive(Debug, Deserialize)]
struct Document<T> {
    saved_at: u64,
    records: Vec<T>,
}

#[derive(Debug, Serialize)]
struct DocumentRef<'a, T> {
    saved_at: u64,
    records: &'a [T],
}

#[derive(Clone, Debug)]
struct Slot<T> {
    records: Vec<T>,
    saved_at: Option<SystemTime>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            saved_at: None,
        }
    }
}

pub struct ReferenceCache {
    dir: PathBuf,
    locations: Slot<Location>,
    routes: Slot<RouteEntry>,
    surcharges: Slot<SurchargeRule>,
}

impl ReferenceCache {
    /// Open the cache at the platform data directory, creating it on
    /// first use.
    pub fn open_default() -> Result<Self, StoreError> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
            .ok_or(StoreError::StorageUnavailable)?;
        Self::open(dirs.data_dir())
    }

    /// Open the cache at an explicit directory (tests, portable installs).
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            locations: load_slot(dir, Dataset::Locations),
            routes: load_slot(dir, Dataset::Routes),
            surcharges: load_slot(dir, Dataset::Surcharges),
        })
    }

    /// True when the dataset has never been refreshed or its last
    /// refresh is older than `max_age`.
    pub fn is_stale(&self, dataset: Dataset, max_age: Duration) -> bool {
        let saved_at = match dataset {
            Dataset::Locations => self.locations.saved_at,
            Dataset::Routes => self.routes.saved_at,
            Dataset::Surcharges => self.surcharges.saved_at,
        };
        stale_at(saved_at, SystemTime::now(), max_age)
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations.records
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes.records
    }

    pub fn surcharges(&self) -> &[SurchargeRule] {
        &self.surcharges.records
    }

    pub fn replace_locations(&mut self, records: Vec<Location>) -> Result<(), StoreError> {
        Self::replace_slot(&self.dir, Dataset::Locations, &mut self.locations, records)
    }

    pub fn replace_routes(&mut self, records: Vec<RouteEntry>) -> Result<(), StoreError> {
        Self::replace_slot(&self.dir, Dataset::Routes, &mut self.routes, records)
    }

    pub fn replace_surcharges(&mut self, records: Vec<SurchargeRule>) -> Result<(), StoreError> {
        Self::replace_slot(&self.dir, Dataset::Surcharges, &mut self.surcharges, records)
    }

    /// Degraded path for the optional catalog: empty the working set
    /// without touching the persisted dataset, so the next start still
    /// refreshes.
    pub fn reset_surcharges(&mut self) {
        self.surcharges.records.clear();
    }

    /// Drop every dataset and timestamp. Idempotent.
    pub fn clear_everything(&mut self) -> Result<(), StoreError> {
        for dataset in Dataset::ALL {
            match fs::remove_file(self.dir.join(dataset.file_name())) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.locations = Slot::default();
        self.routes = Slot::default();
        self.surcharges = Slot::default();
        Ok(())
    }

    fn replace_slot<T: Serialize>(
        dir: &Path,
        dataset: Dataset,
        slot: &mut Slot<T>,
        records: Vec<T>,
    ) -> Result<(), StoreError> {
        let saved_at = SystemTime::now();
        let outcome = write_document(dir, dataset, &records, saved_at);
        // The working set always takes the fresh records; when the disk
        // commit fails no timestamp lands on disk and the next start
        // re-fetches.
        slot.records = records;
        slot.saved_at = Some(saved_at);
        if outcome.is_ok() {
            debug!(%dataset, records = slot.records.len(), "dataset cached");
        }
        outcome
    }
}

fn load_slot<T: DeserializeOwned>(dir: &Path, dataset: Dataset) -> Slot<T> {
    let path = dir.join(dataset.file_name());
    if !path.exists() {
        debug!(%dataset, "no cached dataset");
        return Slot::default();
    }

    let document = fs::read_to_string(&path)
        .map_err(StoreError::from)
        .and_then(|raw| serde_json::from_str::<Document<T>>(&raw).map_err(StoreError::from));
    match document {
        Ok(document) => {
            debug!(%dataset, records = document.records.len(), "loaded cached dataset");
            Slot {
                records: document.records,
                saved_at: Some(UNIX_EPOCH + Duration::from_secs(document.saved_at)),
            }
        }
        Err(err) => {
            warn!(%dataset, %err, "failed to load cached dataset; treating as absent");
            Slot::default()
        }
    }
}

fn write_document<T: Serialize>(
    dir: &Path,
    dataset: Dataset,
    records: &[T],
    saved_at: SystemTime,
) -> Result<(), StoreError> {
    let document = DocumentRef {
        saved_at: unix_seconds(saved_at),
        records,
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut file, &document)?;
    file.persist(dir.join(dataset.file_name()))
        .map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}

fn stale_at(saved_at: Option<SystemTime>, now: SystemTime, max_age: Duration) -> bool {
    match saved_at {
        Some(time) => now
            .duration_since(time)
            .map(|age| age > max_age)
            .unwrap_or(true),
        None => true,
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|span| span.as_secs())
        .unwrap_or(0)
}
