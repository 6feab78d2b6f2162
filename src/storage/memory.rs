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
use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};

use super::{Key, KeyValue, StorageError};

/// Keeps everything in memory. Nothing survives the process.
#[derive(Default)]
pub struct Storage {
    values: Mutex<HashMap<Key, String>>,
    update_lock: Mutex<()>,
}

impl Storage {
    pub fn new() -> Storage {
        Storage::default()
    }
}

impl KeyValue for Storage {
    fn get(&self, key: Key) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(&key).cloned())
    }

    fn set(&self, key: Key, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: Key) -> Result<(), StorageError> {
        self.values.lock().remove(&key);
        Ok(())
    }

    fn update_lock(&self) -> MutexGuard<'_, ()> {
        self.update_lock.lock()
    }
}
