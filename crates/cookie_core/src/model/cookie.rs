use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedCookie {
    pub name: String,
    pub image_path: String,
    #[serde(default)]
    pub purchased_at: String,
}

/// An entry in the cookie shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOffer {
    pub name: String,
    #[serde(default)]
    pub image_path: String,
    pub price: i64,
}

impl CookieOffer {
    pub fn new(name: &str, image_path: &str, price: i64) -> Self {
        Self {
            name: name.to_string(),
            image_path: image_path.to_string(),
            price,
        }
    }
}

pub fn default_catalog() -> Vec<CookieOffer> {
    vec![
        CookieOffer::new("Chocolate Chip", "chocolate-chip", 10),
        CookieOffer::new("Oatmeal Raisin", "oatmeal-raisin", 15),
        CookieOffer::new("Snickerdoodle", "snickerdoodle", 20),
        CookieOffer::new("Double Chocolate", "double-chocolate", 30),
        CookieOffer::new("Macadamia Nut", "macadamia-nut", 50),
    ]
}
