use crate::error::Result;
use crate::model::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const MOVIE_NIGHTS: &str = "movie-nights";
pub const THEMES: &str = "themes";
pub const CURRENT_USER: &str = "current-user";
pub const REMINDERS: &str = "reminders";

/// Plain get/set by key. Writes are durable once `set_value` returns.
pub trait Storage {
    fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set_value(&self, key: &str, value: &[u8]) -> Result<()>;
    fn remove_value(&self, key: &str) -> Result<()>;
}

impl Storage for sled::Db {
    fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key)?.map(|v| v.to_vec()))
    }

    fn set_value(&self, key: &str, value: &[u8]) -> Result<()> {
        self.insert(key, value)?;
        self.flush()?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        self.remove(key)?;
        self.flush()?;
        Ok(())
    }
}

pub trait SnapshotDb {
    /// Reads every key, falling back to the default for anything missing or unreadable.
    fn load_snapshot(&self) -> Snapshot;
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
}

fn read<S: Storage + ?Sized, T: DeserializeOwned>(storage: &S, key: &str) -> Result<Option<T>> {
    match storage.get_value(key)? {
        Some(data) => Ok(Some(bincode::deserialize(&data)?)),
        None => Ok(None),
    }
}

fn write<S: Storage + ?Sized, T: Serialize>(storage: &S, key: &str, value: &T) -> Result<()> {
    storage.set_value(key, &bincode::serialize(value)?)
}

fn or_default<T>(key: &str, value: Result<Option<T>>, default: T) -> T {
    match value {
        Ok(Some(value)) => value,
        Ok(None) => {
            log::info!("no saved data for {}", key);
            default
        }
        Err(err) => {
            log::info!("could not read {}, starting empty: {}", key, err);
            default
        }
    }
}

impl<S: Storage> SnapshotDb for S {
    fn load_snapshot(&self) -> Snapshot {
        let defaults = Snapshot::default();
        let current_user = self
            .get_value(CURRENT_USER)
            .map(|v| v.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()));
        Snapshot {
            nights: or_default(MOVIE_NIGHTS, read(self, MOVIE_NIGHTS), defaults.nights),
            themes: or_default(THEMES, read(self, THEMES), defaults.themes),
            reminders: or_default(REMINDERS, read(self, REMINDERS), defaults.reminders),
            current_user: or_default(CURRENT_USER, current_user.map(|v| v.map(Some)), None),
        }
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        write(self, MOVIE_NIGHTS, &snapshot.nights)?;
        write(self, THEMES, &snapshot.themes)?;
        match &snapshot.current_user {
            Some(user) => self.set_value(CURRENT_USER, user.as_bytes())?,
            None => self.remove_value(CURRENT_USER)?,
        }
        write(self, REMINDERS, &snapshot.reminders)
    }
}
