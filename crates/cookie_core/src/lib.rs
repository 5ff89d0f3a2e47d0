//! Points-and-task-state ledger for the cookie jar to-do app.
//!
//! Completing a to-do item credits its points to a balance that can be spent
//! on virtual cookies. [`app::CookieJarApp`] is the entry point; it wires the
//! [`ledger::TaskLedger`], [`account::PointsAccount`] and
//! [`cookies::CookieJar`] to one store and one [`notifier::ChangeNotifier`].

pub mod account;
pub mod app;
pub mod config;
pub mod cookies;
pub mod error;
pub mod ledger;
pub mod model;
pub mod notifier;
pub mod storage;
