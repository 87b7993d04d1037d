use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Fixed category set offered by the shop (display spelling is the wire spelling)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Chocolate,
    Gummy,
    #[serde(rename = "Hard Candy")]
    HardCandy,
    Lollipop,
    Caramel,
    Mint,
    Sour,
    #[serde(rename = "Sugar Free")]
    SugarFree,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Chocolate,
        Category::Gummy,
        Category::HardCandy,
        Category::Lollipop,
        Category::Caramel,
        Category::Mint,
        Category::Sour,
        Category::SugarFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Chocolate => "Chocolate",
            Category::Gummy => "Gummy",
            Category::HardCandy => "Hard Candy",
            Category::Lollipop => "Lollipop",
            Category::Caramel => "Caramel",
            Category::Mint => "Mint",
            Category::Sour => "Sour",
            Category::SugarFree => "Sugar Free",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; accepts "hard candy", "Hard-Candy" and "hard_candy" alike
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        Category::ALL
            .into_iter()
            .find(|c| {
                let name: String = c
                    .as_str()
                    .chars()
                    .filter(|ch| ch.is_alphanumeric())
                    .flat_map(char::to_lowercase)
                    .collect();
                name == wanted
            })
            .ok_or_else(|| s.trim().to_string())
    }
}

/// A product listing as returned by the shop API.
/// The server owns this entity; the client never caches it past the current view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Sweet {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub quantity: u32,
}

impl Sweet {
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::for_quantity(self.quantity)
    }
}

/// Sweet fields minus id, shared by create and update
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewSweet {
    pub name: String,
    pub category: Category,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockLevel {
    pub fn for_quantity(quantity: u32) -> Self {
        match quantity {
            0 => StockLevel::OutOfStock,
            1..=9 => StockLevel::LowStock,
            _ => StockLevel::InStock,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockLevel::OutOfStock => "Out of Stock",
            StockLevel::LowStock => "Low Stock",
            StockLevel::InStock => "In Stock",
        }
    }
}

/// Ids arrive as strings from some backends and as numbers from others
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
}

/// Register may or may not hand back a token depending on the backend
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RegisterResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Error body the backend attaches to 4xx responses
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// Claims carried in the token payload. Never verified client-side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    #[serde(deserialize_with = "de_id")]
    pub sub: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    pub exp: u64, // seconds since epoch
}

pub const ADMIN_ROLE: &str = "ADMIN";

impl Session {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE)
    }

    pub fn expires_at_millis(&self) -> i64 {
        (self.exp as i64).saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing_is_lenient() {
        assert_eq!("hard candy".parse::<Category>(), Ok(Category::HardCandy));
        assert_eq!("Sugar-Free".parse::<Category>(), Ok(Category::SugarFree));
        assert_eq!(" chocolate ".parse::<Category>(), Ok(Category::Chocolate));
        assert_eq!("Licorice".parse::<Category>(), Err("Licorice".to_string()));
        assert_eq!(
            serde_json::to_string(&Category::HardCandy).unwrap(),
            "\"Hard Candy\""
        );
    }

    #[test]
    fn test_sweet_accepts_numeric_and_string_ids() {
        let numeric: Sweet = serde_json::from_str(
            r#"{"id": 7, "name": "Fudge", "category": "Caramel", "price": 2.5, "quantity": 3}"#,
        )
        .unwrap();
        assert_eq!(numeric.id, "7");

        let text: Sweet = serde_json::from_str(
            r#"{"id": "abc", "name": "Fudge", "category": "Caramel", "price": 2.5, "quantity": 0}"#,
        )
        .unwrap();
        assert_eq!(text.id, "abc");
        assert_eq!(text.stock_level(), StockLevel::OutOfStock);
    }

    #[test]
    fn test_stock_level_thresholds() {
        assert_eq!(StockLevel::for_quantity(0).label(), "Out of Stock");
        assert_eq!(StockLevel::for_quantity(9).label(), "Low Stock");
        assert_eq!(StockLevel::for_quantity(10).label(), "In Stock");
    }

    #[test]
    fn test_session_roles_default_to_empty() {
        let session: Session =
            serde_json::from_str(r#"{"sub": "42", "exp": 1700000000, "iat": 1}"#).unwrap();
        assert!(session.roles.is_empty());
        assert!(!session.is_admin());
        assert_eq!(session.expires_at_millis(), 1_700_000_000_000);
    }
}
