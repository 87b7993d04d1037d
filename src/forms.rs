//! Local validation run before anything is sent to the backend.

use crate::error::ValidationError;
use crate::models::{Category, NewSweet, Sweet};

/// Quantity for a purchase of `sweet`, checked against the stock shown to the user
pub fn validate_purchase(sweet: &Sweet, quantity: i64) -> Result<u32, ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::QuantityNotPositive);
    }
    if quantity > i64::from(sweet.quantity) {
        return Err(ValidationError::InsufficientStock {
            available: sweet.quantity,
        });
    }
    // Bounded by sweet.quantity, which is a u32
    Ok(quantity as u32)
}

pub fn validate_restock(quantity: i64) -> Result<u32, ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::QuantityNotPositive);
    }
    u32::try_from(quantity).map_err(|_| ValidationError::QuantityNotPositive)
}

/// Price times quantity, e.g. `$1,234.50`
pub fn format_price(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

pub fn purchase_total(sweet: &Sweet, quantity: u32) -> f64 {
    sweet.price * f64::from(quantity)
}

/// Create/edit form as typed by the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweetForm {
    pub name: String,
    pub category: String,
    pub price: String,
    pub quantity: String,
}

impl SweetForm {
    /// Pre-fill for editing an existing listing
    pub fn from_sweet(sweet: &Sweet) -> Self {
        Self {
            name: sweet.name.clone(),
            category: sweet.category.clone(),
            price: sweet.price.to_string(),
            quantity: sweet.quantity.to_string(),
        }
    }

    /// Checks run in order: name, category, price, quantity; the first failure wins
    pub fn validate(&self) -> Result<NewSweet, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::NameRequired);
        }

        let category = match self.category.trim() {
            "" => return Err(ValidationError::CategoryRequired),
            raw => raw
                .parse::<Category>()
                .map_err(ValidationError::UnknownCategory)?,
        };

        let price = match self.price.trim().parse::<f64>() {
            Ok(p) if p.is_finite() && p > 0.0 => p,
            _ => return Err(ValidationError::PriceNotPositive),
        };

        let quantity = match self.quantity.trim().parse::<i64>() {
            Ok(q) if q >= 0 => u32::try_from(q).map_err(|_| ValidationError::QuantityNegative)?,
            _ => return Err(ValidationError::QuantityNegative),
        };

        Ok(NewSweet {
            name: name.to_string(),
            category,
            price,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truffle(quantity: u32) -> Sweet {
        Sweet {
            id: "1".to_string(),
            name: "Dark Truffle".to_string(),
            category: "Chocolate".to_string(),
            price: 2.5,
            quantity,
        }
    }

    #[test]
    fn test_purchase_quantity_rules() {
        let sweet = truffle(3);
        assert_eq!(
            validate_purchase(&sweet, 0).unwrap_err().to_string(),
            "Quantity must be greater than 0"
        );
        assert_eq!(
            validate_purchase(&sweet, -2),
            Err(ValidationError::QuantityNotPositive)
        );
        let err = validate_purchase(&sweet, 5).unwrap_err();
        assert_eq!(err, ValidationError::InsufficientStock { available: 3 });
        assert!(err.to_string().contains('3'));
        assert_eq!(validate_purchase(&sweet, 3), Ok(3));
    }

    #[test]
    fn test_restock_quantity_rules() {
        assert_eq!(validate_restock(0), Err(ValidationError::QuantityNotPositive));
        assert_eq!(validate_restock(25), Ok(25));
    }

    #[test]
    fn test_price_formatting() {
        assert_eq!(format_price(2.5), "$2.50");
        assert_eq!(format_price(1234.5), "$1,234.50");
        assert_eq!(format_price(0.0), "$0.00");
        assert_eq!(format_price(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_price(purchase_total(&truffle(3), 3)), "$7.50");
    }

    #[test]
    fn test_form_validation_order() {
        let mut form = SweetForm::default();
        assert_eq!(form.validate(), Err(ValidationError::NameRequired));

        form.name = "  Mint Leaf ".to_string();
        assert_eq!(form.validate(), Err(ValidationError::CategoryRequired));

        form.category = "Licorice".to_string();
        assert_eq!(
            form.validate(),
            Err(ValidationError::UnknownCategory("Licorice".to_string()))
        );

        form.category = "mint".to_string();
        form.price = "0".to_string();
        assert_eq!(form.validate(), Err(ValidationError::PriceNotPositive));

        form.price = "1.10".to_string();
        form.quantity = "-1".to_string();
        assert_eq!(form.validate(), Err(ValidationError::QuantityNegative));

        form.quantity = "0".to_string();
        let sweet = form.validate().unwrap();
        assert_eq!(sweet.name, "Mint Leaf");
        assert_eq!(sweet.category, Category::Mint);
        assert_eq!(sweet.price, 1.1);
        assert_eq!(sweet.quantity, 0);
    }

    #[test]
    fn test_form_prefill_round_trips() {
        let form = SweetForm::from_sweet(&truffle(12));
        let sweet = form.validate().unwrap();
        assert_eq!(sweet.category, Category::Chocolate);
        assert_eq!(sweet.quantity, 12);
    }
}
