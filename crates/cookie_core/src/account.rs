use crate::error::AppError;
use crate::notifier::{ChangeNotifier, Topic};
use crate::storage::{self, POINTS_KEY, StoreHandle};
use tracing::debug;

/// The single points balance. No floor or ceiling is enforced.
#[derive(Debug)]
pub struct PointsAccount {
    store: StoreHandle,
    notifier: ChangeNotifier,
    balance: i64,
}

impl PointsAccount {
    pub fn open(store: StoreHandle, notifier: ChangeNotifier) -> Result<Self, AppError> {
        let balance = storage::load_or_default(&store, POINTS_KEY)?;
        debug!(balance, "loaded points account");
        Ok(Self {
            store,
            notifier,
            balance,
        })
    }

    pub fn current_balance(&self) -> i64 {
        self.balance
    }

    pub fn credit(&mut self, points: i64) -> Result<i64, AppError> {
        self.adjust_silently(points)?;
        self.notifier.publish(Topic::PointsChanged);
        Ok(self.balance)
    }

    pub fn debit(&mut self, points: i64) -> Result<i64, AppError> {
        self.adjust_silently(negated(points)?)?;
        self.notifier.publish(Topic::PointsChanged);
        Ok(self.balance)
    }

    pub fn reset_balance(&mut self) -> Result<(), AppError> {
        self.commit(0)?;
        debug!("points balance reset");
        self.notifier.publish(Topic::PointsChanged);
        Ok(())
    }

    /// Persists `balance + delta` without publishing. Callers that pair a
    /// balance change with another mutation publish once both are committed.
    pub(crate) fn adjust_silently(&mut self, delta: i64) -> Result<(), AppError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| AppError::invalid_argument("points balance would overflow"))?;
        self.commit(next)?;
        debug!(delta, balance = next, "points adjusted");
        Ok(())
    }

    /// Persists a previously observed balance without publishing.
    pub(crate) fn restore_silently(&mut self, balance: i64) -> Result<(), AppError> {
        self.commit(balance)?;
        debug!(balance, "points restored");
        Ok(())
    }

    fn commit(&mut self, balance: i64) -> Result<(), AppError> {
        storage::save(&self.store, POINTS_KEY, &balance)?;
        self.balance = balance;
        Ok(())
    }
}

/// `-points`, failing for `i64::MIN`.
pub(crate) fn negated(points: i64) -> Result<i64, AppError> {
    points
        .checked_neg()
        .ok_or_else(|| AppError::invalid_argument("points balance would overflow"))
}
