//! The in-memory copy of everything, kept in step with storage.

use crate::database::{SnapshotDb, Storage};
use crate::error::Result;
use crate::lifecycle;
use crate::model::*;
use rand::Rng;

pub struct Store<S = sled::Db> {
    storage: S,
    snapshot: Snapshot,
    selected: Option<NightId>,
    spinning: bool,
    last_id: u64,
}

pub fn today() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}

impl<S: Storage> Store<S> {
    pub fn open(storage: S) -> Self {
        let snapshot = storage.load_snapshot();
        log::debug!(
            "loaded {} nights, {} themes, {} reminders",
            snapshot.nights.len(),
            snapshot.themes.len(),
            snapshot.reminders.len()
        );
        Store {
            storage,
            snapshot,
            selected: None,
            spinning: false,
            last_id: 0,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn current_user(&self) -> Option<&str> {
        self.snapshot.current_user.as_deref()
    }

    pub fn night(&self, id: NightId) -> Option<&MovieNight> {
        self.snapshot.nights.iter().find(|n| n.id == id)
    }

    pub fn selected_night(&self) -> Option<&MovieNight> {
        self.night(self.selected?)
    }

    pub fn select(&mut self, id: NightId) {
        self.selected = self.night(id).map(|n| n.id);
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub(crate) fn set_spinning(&mut self, spinning: bool) {
        self.spinning = spinning;
    }

    /// Millisecond timestamps, strictly increasing even within one millisecond.
    fn next_id(&mut self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }

    /// Replaces the snapshot and writes it out.
    ///
    /// A failed write is logged and returned, but the new snapshot stays in memory.
    fn commit(&mut self, snapshot: Snapshot) -> Result<()> {
        self.snapshot = snapshot;
        if let Some(id) = self.selected {
            if self.night(id).is_none() {
                self.selected = None;
            }
        }
        self.storage.save_snapshot(&self.snapshot).map_err(|err| {
            log::error!("error saving data: {}", err);
            err
        })
    }

    fn commit_nights(&mut self, nights: Vec<MovieNight>) -> Result<()> {
        let snapshot = Snapshot {
            nights,
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    fn user(&self) -> Option<String> {
        self.current_user().map(str::to_owned)
    }

    pub fn login(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        let snapshot = Snapshot {
            current_user: Some(name.to_owned()),
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    pub fn logout(&mut self) -> Result<()> {
        log::debug!("logging out {:?}", self.current_user());
        let snapshot = Snapshot {
            current_user: None,
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    pub fn create_night(&mut self, theme: &str) -> Result<NightId> {
        let id = self.next_id();
        let nights = lifecycle::create_night(&self.snapshot.nights, id, theme, &today());
        self.selected = Some(id);
        log::info!("created night {} with theme {:?}", id, theme);
        self.commit_nights(nights)?;
        Ok(id)
    }

    pub fn update_date(&mut self, night_id: NightId, date: &str) -> Result<()> {
        let nights = lifecycle::update_date(&self.snapshot.nights, night_id, date);
        self.commit_nights(nights)
    }

    pub fn add_submission(&mut self, night_id: NightId, title: &str) -> Result<()> {
        let nights = match self.user() {
            Some(user) if !title.is_empty() => {
                let id = self.next_id();
                lifecycle::add_submission(&self.snapshot.nights, night_id, id, title, &user)
            }
            _ => self.snapshot.nights.clone(),
        };
        self.commit_nights(nights)
    }

    pub fn update_submission(&mut self, night_id: NightId, movie_id: SubmissionId, title: &str) -> Result<()> {
        let nights = lifecycle::update_submission(&self.snapshot.nights, night_id, movie_id, title);
        self.commit_nights(nights)
    }

    pub fn delete_submission(&mut self, night_id: NightId, movie_id: SubmissionId) -> Result<()> {
        let nights = lifecycle::delete_submission(&self.snapshot.nights, night_id, movie_id);
        self.commit_nights(nights)
    }

    pub fn vote(&mut self, night_id: NightId, movie_id: SubmissionId, vote: Vote) -> Result<()> {
        let nights = match self.user() {
            Some(user) => lifecycle::vote(&self.snapshot.nights, night_id, movie_id, vote, &user),
            None => self.snapshot.nights.clone(),
        };
        self.commit_nights(nights)
    }

    pub fn eliminate<R: Rng + ?Sized>(&mut self, night_id: NightId, rng: &mut R) -> Result<()> {
        let nights = lifecycle::eliminate_one(&self.snapshot.nights, night_id, rng);
        if let Some(winner) = nights
            .iter()
            .find(|n| n.id == night_id)
            .and_then(MovieNight::winning_submission)
        {
            log::info!("night {} decided: {:?}", night_id, winner.title);
        }
        self.commit_nights(nights)
    }

    pub fn add_review(&mut self, night_id: NightId, rating: Rating, comment: &str) -> Result<()> {
        let nights = match self.user() {
            Some(user) => {
                let id = self.next_id();
                lifecycle::add_review(&self.snapshot.nights, night_id, id, rating, comment, &user, &today())
            }
            None => self.snapshot.nights.clone(),
        };
        self.commit_nights(nights)
    }

    pub fn add_theme(&mut self, theme: &str) -> Result<()> {
        let snapshot = Snapshot {
            themes: lifecycle::add_theme(&self.snapshot.themes, theme),
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    pub fn update_theme(&mut self, old: &str, new: &str) -> Result<()> {
        let snapshot = Snapshot {
            themes: lifecycle::update_theme(&self.snapshot.themes, old, new),
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    pub fn delete_theme(&mut self, theme: &str) -> Result<()> {
        let snapshot = Snapshot {
            themes: lifecycle::delete_theme(&self.snapshot.themes, theme),
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    /// Records a phone number for the current user. No message is ever sent.
    pub fn add_reminder(&mut self, phone: &str) -> Result<()> {
        let reminders = match self.user() {
            Some(user) => {
                let id = self.next_id();
                lifecycle::add_reminder(&self.snapshot.reminders, id, &user, phone)
            }
            None => self.snapshot.reminders.clone(),
        };
        let snapshot = Snapshot {
            reminders,
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }

    pub fn remove_reminder(&mut self, id: u64) -> Result<()> {
        let snapshot = Snapshot {
            reminders: lifecycle::remove_reminder(&self.snapshot.reminders, id),
            ..self.snapshot.clone()
        };
        self.commit(snapshot)
    }
}
