mod cookie;
mod task;

pub use cookie::{CookieOffer, PurchasedCookie, default_catalog};
pub use task::{Location, Section, TaskItem, balance_label, points_label};
