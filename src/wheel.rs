//! The elimination wheel: one timed elimination at a time.

use crate::database::Storage;
use crate::error::Result;
use crate::model::NightId;
use crate::store::Store;
use rand::Rng;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    /// The night was updated (or there was nothing to do).
    Done,
    /// Another spin is still in progress; nothing happened.
    Busy,
}

pub(crate) fn lock<S>(store: &Mutex<Store<S>>) -> MutexGuard<'_, Store<S>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the spinning mark when dropped, unless disarmed first.
///
/// A spin whose future is dropped mid-delay (the client went away) must not leave
/// the wheel locked for good.
struct Spinning<'a, S: Storage> {
    store: &'a Mutex<Store<S>>,
    armed: bool,
}

impl<S: Storage> Spinning<'_, S> {
    /// Must be called while holding the store lock; the caller clears the mark.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S: Storage> Drop for Spinning<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("spin abandoned, releasing the wheel");
            lock(self.store).set_spinning(false);
        }
    }
}

/// Spins the wheel for a night.
///
/// With more than one active submission the store is marked spinning for `delay`
/// before one of them is eliminated. A night with one active submission is decided
/// straight away. The lock is not held while waiting, and dropping the future
/// while it waits releases the wheel again.
pub async fn spin<S, R>(store: &Mutex<Store<S>>, night_id: NightId, delay: Duration, rng: &mut R) -> Result<Spin>
where
    S: Storage,
    R: Rng + ?Sized,
{
    let spinning = {
        let mut locked = lock(store);
        let can_spin = match locked.night(night_id) {
            Some(night) => night.can_spin(),
            None => return Ok(Spin::Done),
        };
        if !can_spin {
            locked.eliminate(night_id, rng)?;
            return Ok(Spin::Done);
        }
        if locked.is_spinning() {
            log::debug!("night {}: wheel already spinning", night_id);
            return Ok(Spin::Busy);
        }
        locked.set_spinning(true);
        Spinning { store, armed: true }
    };

    actix_rt::time::sleep(delay).await;

    let mut locked = lock(store);
    spinning.disarm();
    locked.set_spinning(false);
    locked.eliminate(night_id, rng)?;
    Ok(Spin::Done)
}
