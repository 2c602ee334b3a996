// Copyright (C) 2026 Talkless Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use config::{Config, File};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    clips::{decode_file, ClipId, ClipInfo, ClipStore, DecodedAudio, DecodeError},
    error::EngineError,
};

/// The metadata file kept in the library directory.
pub const LIBRARY_FILE: &str = "library.yaml";

/// A persisted clip: its ID, display name, file within the library
/// directory, volume and trigger bindings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ClipRecord {
    pub id: u64,
    pub name: String,
    pub file: String,
    pub volume: f32,
    #[serde(default)]
    pub triggers: Vec<String>,
}

/// A YAML representation of the library file.
#[derive(Deserialize, Serialize, Default)]
struct LibraryFile {
    #[serde(default)]
    clips: Vec<ClipRecord>,
}

/// A directory of clip files plus the metadata needed to reload them.
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    records: BTreeMap<ClipId, ClipRecord>,
}

impl Library {
    /// Opens the library at the given directory, creating it if needed.
    pub fn open(root: &Path) -> Result<Library, EngineError> {
        fs::create_dir_all(root)?;
        let metadata = root.join(LIBRARY_FILE);
        let file = if metadata.exists() {
            Config::builder()
                .add_source(File::from(metadata.as_path()))
                .build()
                .and_then(|config| config.try_deserialize::<LibraryFile>())
                .map_err(|e| {
                    EngineError::Library(format!("error parsing {}: {}", metadata.display(), e))
                })?
        } else {
            LibraryFile::default()
        };

        let records = file
            .clips
            .into_iter()
            .map(|record| (ClipId::new(record.id), record))
            .collect::<BTreeMap<_, _>>();
        info!(
            root = %root.display(),
            clips = records.len(),
            "Opened clip library"
        );
        Ok(Library {
            root: root.to_path_buf(),
            records,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted records, ordered by clip ID.
    pub fn records(&self) -> impl Iterator<Item = &ClipRecord> {
        self.records.values()
    }

    pub fn record(&self, id: ClipId) -> Option<&ClipRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decodes every record in parallel and restores the results into the
    /// store. Records that can't be loaded are logged and skipped. Returns the
    /// number of clips loaded.
    pub fn load_into(&self, store: &mut ClipStore) -> usize {
        let format = *store.format();
        let decoded: Vec<(&ClipRecord, Result<DecodedAudio, DecodeError>)> = self
            .records
            .par_iter()
            .map(|(_, record)| (record, decode_file(&self.root.join(&record.file), &format)))
            .collect();

        let mut loaded = 0;
        for (record, audio) in decoded {
            let id = ClipId::new(record.id);
            store.reserve(id);
            let restored = audio.map_err(EngineError::from).and_then(|audio| {
                store.restore(
                    id,
                    &record.name,
                    audio,
                    record.volume,
                    record.triggers.clone(),
                )
            });
            match restored {
                Ok(()) => loaded += 1,
                Err(e) => warn!(
                    clip = %id,
                    file = record.file,
                    err = %e,
                    "Unable to load clip, skipping"
                ),
            }
        }
        info!(loaded, total = self.records.len(), "Library loaded");
        loaded
    }

    /// Copies a file into the library directory under a name not used yet.
    /// Returns the path of the copy.
    pub fn stage(&self, source: &Path) -> Result<PathBuf, EngineError> {
        let stem = source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("clip");
        let extension = source
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default();

        let mut candidate = self.root.join(file_name(stem, 0, extension));
        let mut attempt = 0;
        while candidate.exists() {
            attempt += 1;
            candidate = self.root.join(file_name(stem, attempt, extension));
        }

        fs::copy(source, &candidate)?;
        debug!(from = %source.display(), to = %candidate.display(), "Copied clip into library");
        Ok(candidate)
    }

    /// Records a newly imported clip whose file was staged into the library.
    pub fn add(&mut self, info: &ClipInfo, staged: &Path) -> Result<(), EngineError> {
        let file = staged
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                EngineError::Library(format!("invalid file name {}", staged.display()))
            })?
            .to_string();
        let mut records = self.records.clone();
        records.insert(
            info.id,
            ClipRecord {
                id: info.id.value(),
                name: info.name.clone(),
                file,
                volume: info.volume,
                triggers: info.triggers.clone(),
            },
        );
        self.commit(records)
    }

    /// Updates the volume and triggers of a record from the clip's metadata.
    pub fn update(&mut self, info: &ClipInfo) -> Result<(), EngineError> {
        let mut records = self.records.clone();
        let record = records
            .get_mut(&info.id)
            .ok_or(EngineError::ClipNotFound(info.id))?;
        record.volume = info.volume;
        record.triggers = info.triggers.clone();
        self.commit(records)
    }

    /// Removes a record and deletes its file.
    pub fn remove(&mut self, id: ClipId) -> Result<(), EngineError> {
        let mut records = self.records.clone();
        let record = records.remove(&id).ok_or(EngineError::ClipNotFound(id))?;
        self.commit(records)?;

        let path = self.root.join(&record.file);
        if let Err(e) = fs::remove_file(&path) {
            warn!(file = %path.display(), err = %e, "Unable to remove clip file");
        }
        Ok(())
    }

    /// Saves the given records and makes them current. On failure the
    /// in-memory records are left as they were.
    fn commit(&mut self, records: BTreeMap<ClipId, ClipRecord>) -> Result<(), EngineError> {
        self.save(&records)?;
        self.records = records;
        Ok(())
    }

    /// Writes the metadata file. The new contents replace the old file only
    /// once fully written.
    fn save(&self, records: &BTreeMap<ClipId, ClipRecord>) -> Result<(), EngineError> {
        let file = LibraryFile {
            clips: records.values().cloned().collect(),
        };
        let serialized =
            serde_yml::to_string(&file).map_err(|e| EngineError::Library(e.to_string()))?;

        let path = self.root.join(LIBRARY_FILE);
        let tmp = self.root.join(format!("{}.tmp", LIBRARY_FILE));
        let mut out = fs::File::create(&tmp)?;
        out.write_all(serialized.as_bytes())?;
        out.sync_all()?;
        fs::rename(&tmp, &path)?;
        debug!(clips = file.clips.len(), "Library saved");
        Ok(())
    }
}

fn file_name(stem: &str, attempt: usize, extension: &str) -> String {
    match (attempt, extension.is_empty()) {
        (0, true) => stem.to_string(),
        (0, false) => format!("{}.{}", stem, extension),
        (n, true) => format!("{}-{}", stem, n),
        (n, false) => format!("{}-{}.{}", stem, n, extension),
    }
}
