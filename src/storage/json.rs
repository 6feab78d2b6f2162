// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::{Mutex, MutexGuard};

use super::{Key, KeyValue, StorageError};

/// Stores each key as `<key>.json` in a directory.
pub struct Storage {
    dir: PathBuf,
    update_lock: Mutex<()>,
}

impl Storage {
    /// Creates the storage. The directory is created on the first write.
    pub fn new(dir: &Path) -> Storage {
        Storage {
            dir: dir.to_path_buf(),
            update_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: Key) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl KeyValue for Storage {
    fn get(&self, key: Key) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: Key, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        // Readers see either the old file or the new one, never half of it.
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key.as_str()));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: Key) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn update_lock(&self) -> MutexGuard<'_, ()> {
        self.update_lock.lock()
    }
}
