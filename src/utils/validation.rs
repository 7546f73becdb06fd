//! Utilidades de validación
//!
//! Funciones helper usadas por los DTOs (`#[validate(custom = ...)]`)
//! y por las reglas del motor de viajes.

use rust_decimal::Decimal;
use validator::ValidationError;

/// Validar que una cantidad decimal sea estrictamente positiva
pub fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut error = ValidationError::new("positive");
        error.add_param("actual".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Normalizar etiquetas opcionales: espacios fuera, vacío => None
pub fn normalize_label(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_decimal() {
        assert!(validate_positive_decimal(&Decimal::new(1, 2)).is_ok());
        assert!(validate_positive_decimal(&Decimal::ZERO).is_err());
        assert!(validate_positive_decimal(&Decimal::new(-5, 0)).is_err());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(Some("  Lyon ".into())), Some("Lyon".into()));
        assert_eq!(normalize_label(Some("  ".into())), None);
        assert_eq!(normalize_label(None), None);
    }
}
