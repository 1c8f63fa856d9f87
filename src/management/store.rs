use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    error::StoreError,
    types::{PlaybackSnapshot, TrackRecord},
    utils,
};

const SAVE_ATTEMPTS: u32 = 3;
const SAVE_BACKOFF: Duration = Duration::from_millis(200);
const HEADERS: [&str; 4] = ["Song_ID", "Song", "Artists", "Count"];

#[derive(Debug, Serialize, Deserialize)]
struct TrackRow {
    #[serde(rename = "Song_ID")]
    track_id: String,
    #[serde(rename = "Song")]
    track_name: String,
    #[serde(rename = "Artists")]
    artists: String,
    #[serde(rename = "Count")]
    count: u64,
}

impl From<&TrackRecord> for TrackRow {
    fn from(record: &TrackRecord) -> Self {
        TrackRow {
            track_id: record.track_id.clone(),
            track_name: record.track_name.clone(),
            artists: utils::encode_artists(&record.artists),
            count: record.play_count,
        }
    }
}

impl From<TrackRow> for TrackRecord {
    fn from(row: TrackRow) -> Self {
        TrackRecord {
            track_id: row.track_id,
            track_name: row.track_name,
            artists: utils::decode_artists(&row.artists),
            play_count: row.count,
        }
    }
}

/// Play counts keyed by track id, backed by a CSV file.
///
/// Every mutation is one unit: update the in-memory table, write the whole
/// table back, and roll the in-memory change back if the write cannot be
/// recovered. Only the polling loop writes, so no locking is needed.
pub struct TrackStore {
    path: PathBuf,
    records: Vec<TrackRecord>,
    index: HashMap<String, usize>,
}

impl TrackStore {
    /// Loads the table at `path`, creating an empty one if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `path` - CSV file with the `Song_ID,Song,Artists,Count` columns.
    ///   Missing parent directories are created.
    ///
    /// # Recovery
    ///
    /// - An unreadable table is copied to [`TrackStore::backup_path`] before
    ///   it is replaced by an empty one
    /// - Duplicate rows of the same track are merged by adding their counts
    /// - Legacy artist cells (`['A', 'B']`) are read as artist lists
    ///
    /// # Error Handling
    ///
    /// - [`StoreError::Io`] when the file cannot be read, or the unreadable
    ///   table cannot be backed up
    /// - [`StoreError::Persist`] when a new table cannot be written at all
    ///
    /// # Example
    ///
    /// ```
    /// let mut store = TrackStore::open(config::store_path()).await?;
    /// let count = store.record_play(&snapshot).await?;
    /// ```
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = TrackStore {
            path: path.into(),
            records: Vec::new(),
            index: HashMap::new(),
        };

        if !store.path.exists() {
            store.save().await?;
            info!(path = %store.path.display(), "created new track table");
            return Ok(store);
        }

        let bytes = async_fs::read(&store.path)
            .await
            .map_err(|source| StoreError::Io {
                path: store.path.clone(),
                source,
            })?;

        match decode(&bytes) {
            Ok(records) => {
                for record in records {
                    store.insert_loaded(record);
                }
                info!(
                    path = %store.path.display(),
                    entries = store.records.len(),
                    "loaded track table"
                );
            }
            Err(e) => {
                error!(path = %store.path.display(), error = %e, "track table is unreadable");
                let backup = store.backup_path();
                async_fs::copy(&store.path, &backup)
                    .await
                    .map_err(|source| StoreError::Io {
                        path: backup.clone(),
                        source,
                    })?;
                warn!(backup = %backup.display(), "backed up unreadable track table, starting empty");
                store.save().await?;
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, track_id: &str) -> Option<&TrackRecord> {
        self.index.get(track_id).map(|&i| &self.records[i])
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts one play of the snapshot's track, inserting it at 1 when new.
    /// Returns the new count.
    pub async fn record_play(&mut self, snapshot: &PlaybackSnapshot) -> Result<u64, StoreError> {
        if self.index.contains_key(&snapshot.track_id) {
            return self
                .increment(&snapshot.track_id)
                .await
                .map(|count| count.unwrap_or_default());
        }

        self.index
            .insert(snapshot.track_id.clone(), self.records.len());
        self.records.push(TrackRecord {
            track_id: snapshot.track_id.clone(),
            track_name: snapshot.track_name.clone(),
            artists: snapshot.artists.clone(),
            play_count: 1,
        });

        if let Err(e) = self.save().await {
            self.records.pop();
            self.index.remove(&snapshot.track_id);
            return Err(e);
        }

        info!(
            track_id = %snapshot.track_id,
            track = %snapshot.track_name,
            artists = %snapshot.artists.join(", "),
            "added new track"
        );
        Ok(1)
    }

    /// Adds one to an existing track's count. Unknown ids are ignored.
    pub async fn increment(&mut self, track_id: &str) -> Result<Option<u64>, StoreError> {
        let Some(&i) = self.index.get(track_id) else {
            warn!(track_id, "track not found for counter update");
            return Ok(None);
        };

        self.records[i].play_count += 1;
        if let Err(e) = self.save().await {
            self.records[i].play_count -= 1;
            return Err(e);
        }

        let count = self.records[i].play_count;
        debug!(track_id, count, "updated play counter");
        Ok(Some(count))
    }

    /// Writes the current table to [`TrackStore::backup_path`].
    pub async fn backup(&self) -> Result<PathBuf, StoreError> {
        let backup = self.backup_path();
        self.write_to(&backup)
            .await
            .map_err(|source| StoreError::Io {
                path: backup.clone(),
                source,
            })?;
        info!(backup = %backup.display(), "created track table backup");
        Ok(backup)
    }

    /// `songs.csv` backs up to `songs.bak.csv`.
    pub fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "songs".to_string());
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}.bak.{}", ext.to_string_lossy()),
            None => format!("{stem}.bak"),
        };
        self.path.with_file_name(name)
    }

    fn insert_loaded(&mut self, record: TrackRecord) {
        match self.index.get(&record.track_id) {
            Some(&i) => {
                warn!(track_id = %record.track_id, "duplicate track row, merging counts");
                self.records[i].play_count += record.play_count;
            }
            None => {
                self.index
                    .insert(record.track_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Persists the full table, retrying with backoff. When every attempt
    /// fails the table goes to the backup path instead; only if that fails
    /// too is the error returned.
    async fn save(&self) -> Result<(), StoreError> {
        let mut attempt = 1;
        loop {
            let source = match self.write_to(&self.path).await {
                Ok(()) => return Ok(()),
                Err(source) => source,
            };

            if attempt < SAVE_ATTEMPTS {
                warn!(attempt, error = %source, "saving track table failed, retrying");
                tokio::time::sleep(SAVE_BACKOFF * 2u32.pow(attempt - 1)).await;
                attempt += 1;
                continue;
            }

            error!(attempts = attempt, error = %source, "cannot save track table");
            return match self.backup().await {
                Ok(backup) => {
                    warn!(backup = %backup.display(), "track table kept in backup until the next save");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "backup of track table failed too");
                    Err(StoreError::Persist {
                        path: self.path.clone(),
                        attempts: attempt,
                        source,
                    })
                }
            };
        }
    }

    async fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent).await?;
            }
        }

        let bytes = self.encode()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        async_fs::write(&tmp, bytes).await?;
        async_fs::rename(&tmp, path).await
    }

    fn encode(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(HEADERS)?;
        for record in &self.records {
            writer.serialize(TrackRow::from(record))?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

fn decode(bytes: &[u8]) -> Result<Vec<TrackRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(bytes);
    reader
        .deserialize::<TrackRow>()
        .map(|row| row.map(TrackRecord::from))
        .collect()
}
