use crate::account::PointsAccount;
use crate::error::AppError;
use crate::model::{CookieOffer, PurchasedCookie};
use crate::notifier::{ChangeNotifier, Topic};
use crate::storage::{self, PURCHASED_COOKIES_KEY, StoreHandle};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

/// The purchased-cookie record.
#[derive(Debug)]
pub struct CookieJar {
    store: StoreHandle,
    notifier: ChangeNotifier,
    cookies: Vec<PurchasedCookie>,
}

impl CookieJar {
    pub fn open(store: StoreHandle, notifier: ChangeNotifier) -> Result<Self, AppError> {
        let cookies: Vec<PurchasedCookie> = storage::load_or_default(&store, PURCHASED_COOKIES_KEY)?;
        debug!(cookies = cookies.len(), "loaded cookie jar");
        Ok(Self {
            store,
            notifier,
            cookies,
        })
    }

    pub fn cookies(&self) -> Vec<PurchasedCookie> {
        self.cookies.clone()
    }

    pub fn purchase(
        &mut self,
        account: &mut PointsAccount,
        offer: &CookieOffer,
    ) -> Result<PurchasedCookie, AppError> {
        if offer.price < 0 {
            return Err(AppError::invalid_argument("price must not be negative"));
        }
        let balance = account.current_balance();
        if balance < offer.price {
            return Err(AppError::invalid_argument(format!(
                "{} costs {} points but only {balance} are available",
                offer.name, offer.price
            )));
        }

        let purchased_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        let cookie = PurchasedCookie {
            name: offer.name.clone(),
            image_path: offer.image_path.clone(),
            purchased_at,
        };

        account.adjust_silently(-offer.price)?;
        self.cookies.push(cookie.clone());
        if let Err(err) = storage::save(&self.store, PURCHASED_COOKIES_KEY, &self.cookies) {
            self.cookies.pop();
            if let Err(revert) = account.adjust_silently(offer.price) {
                warn!(error = %revert, "could not refund failed cookie purchase");
            }
            return Err(err);
        }

        debug!(cookie = %cookie.name, price = offer.price, "cookie purchased");
        self.notifier.publish(Topic::PointsChanged);
        self.notifier.publish(Topic::CookiesChanged);
        Ok(cookie)
    }

    pub fn reset(&mut self) -> Result<(), AppError> {
        storage::save(&self.store, PURCHASED_COOKIES_KEY, &Vec::<PurchasedCookie>::new())?;
        self.cookies.clear();
        debug!("cookie jar reset");
        self.notifier.publish(Topic::CookiesChanged);
        Ok(())
    }
}
