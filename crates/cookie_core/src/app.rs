//! Application root.
//!
//! [`CookieJarApp`] owns the store, the notifier and every state component,
//! and exposes plain command and query methods for whatever presentation
//! layer drives it. Observers subscribe through [`CookieJarApp::notifier`]
//! and re-read state through the query methods when a topic fires.
//!
//! Handlers run while the triggering command still holds `&mut` access to
//! the app, so an observer that needs the app itself records that it is
//! stale and re-reads once the command has returned.

use crate::account::PointsAccount;
use crate::config::Config;
use crate::cookies::CookieJar;
use crate::error::AppError;
use crate::ledger::TaskLedger;
use crate::model::{CookieOffer, Location, PurchasedCookie, Section, TaskItem, balance_label};
use crate::notifier::ChangeNotifier;
use crate::storage::{JsonFileStore, StoreHandle, shared};
use serde::Serialize;
use std::rc::Rc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub active: Vec<TaskItem>,
    pub completed: Vec<TaskItem>,
    pub balance: i64,
}

#[derive(Debug)]
pub struct CookieJarApp {
    config: Config,
    notifier: ChangeNotifier,
    ledger: TaskLedger,
    account: PointsAccount,
    cookies: CookieJar,
}

impl CookieJarApp {
    pub fn open(store: StoreHandle, config: Config) -> Result<Self, AppError> {
        let notifier = ChangeNotifier::new();
        let ledger = TaskLedger::open(Rc::clone(&store), notifier.clone(), config.delete_policy)?;
        let account = PointsAccount::open(Rc::clone(&store), notifier.clone())?;
        let cookies = CookieJar::open(store, notifier.clone())?;
        Ok(Self {
            config,
            notifier,
            ledger,
            account,
            cookies,
        })
    }

    /// Opens the JSON file store at the default (or env-overridden) path.
    pub fn open_default(config: Config) -> Result<Self, AppError> {
        let store = JsonFileStore::open_default()?;
        info!(path = %store.path().display(), "opened store");
        Self::open(shared(store), config)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn active_items(&self) -> Vec<TaskItem> {
        self.ledger.active_items()
    }

    pub fn completed_items(&self) -> Vec<TaskItem> {
        self.ledger.completed_items()
    }

    pub fn items(&self, section: Section) -> Vec<TaskItem> {
        self.ledger.items(section).to_vec()
    }

    pub fn balance(&self) -> i64 {
        self.account.current_balance()
    }

    pub fn balance_label(&self) -> String {
        balance_label(self.balance())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            active: self.active_items(),
            completed: self.completed_items(),
            balance: self.balance(),
        }
    }

    pub fn cookies(&self) -> Vec<PurchasedCookie> {
        self.cookies.cookies()
    }

    pub fn catalog(&self) -> Vec<CookieOffer> {
        self.config.catalog()
    }

    pub fn create_task(&mut self, title: &str, points: i64) -> Result<TaskItem, AppError> {
        self.ledger.create(title, points)
    }

    pub fn delete_task(&mut self, location: Location) -> Result<TaskItem, AppError> {
        self.ledger.delete(&mut self.account, location)
    }

    pub fn toggle_task(&mut self, location: Location) -> Result<TaskItem, AppError> {
        self.ledger.toggle(&mut self.account, location)
    }

    pub fn reorder_tasks(
        &mut self,
        section: Section,
        from: usize,
        to: usize,
    ) -> Result<(), AppError> {
        self.ledger.reorder(section, from, to)
    }

    pub fn buy_cookie(&mut self, name: &str) -> Result<PurchasedCookie, AppError> {
        let offer = self.config.find_offer(name).ok_or_else(|| {
            AppError::invalid_argument(format!("no cookie named '{}'", name.trim()))
        })?;
        self.cookies.purchase(&mut self.account, &offer)
    }

    pub fn reset_tasks(&mut self) -> Result<(), AppError> {
        self.ledger.reset()
    }

    pub fn reset_points(&mut self) -> Result<(), AppError> {
        self.account.reset_balance()
    }

    pub fn reset_cookies(&mut self) -> Result<(), AppError> {
        self.cookies.reset()
    }

    pub fn reset_all(&mut self) -> Result<(), AppError> {
        self.reset_points()?;
        self.reset_cookies()?;
        self.reset_tasks()
    }
}
