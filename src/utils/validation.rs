use crate::utils::error::{MigrateError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MigrateError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_port(field_name: &str, port: u16) -> Result<()> {
    if port == 0 {
        return Err(MigrateError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: port.to_string(),
            reason: "Port must be between 1 and 65535".to_string(),
        });
    }
    Ok(())
}

/// Every entry in a pool-name list must be a usable identifier.
pub fn validate_pool_name_list(field_name: &str, names: &[String]) -> Result<()> {
    for name in names {
        if name.trim().is_empty() {
            return Err(MigrateError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.clone(),
                reason: "Pool names cannot be empty".to_string(),
            });
        }
    }
    Ok(())
}

/// A pool cannot be both included and excluded.
pub fn validate_disjoint_lists(
    first_field: &str,
    first: &[String],
    second_field: &str,
    second: &[String],
) -> Result<()> {
    let lowered: HashSet<String> = first.iter().map(|n| n.to_lowercase()).collect();
    for name in second {
        if lowered.contains(&name.to_lowercase()) {
            return Err(MigrateError::InvalidConfigValueError {
                field: second_field.to_string(),
                value: name.clone(),
                reason: format!("'{}' also appears in {}", name, first_field),
            });
        }
    }
    Ok(())
}

pub fn validate_credentials(field_name: &str, user: &Option<String>, password: &Option<String>) -> Result<()> {
    match (user, password) {
        (Some(_), None) => Err(MigrateError::InvalidConfigValueError {
            field: format!("{}_password", field_name),
            value: String::new(),
            reason: format!("A user was given for {} but no password", field_name),
        }),
        (None, Some(_)) => Err(MigrateError::InvalidConfigValueError {
            field: format!("{}_user", field_name),
            value: String::new(),
            reason: format!("A password was given for {} but no user", field_name),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("source", "sql01").is_ok());
        assert!(validate_non_empty_string("source", "").is_err());
        assert!(validate_non_empty_string("source", "   ").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(validate_port("source", 1433).is_ok());
        assert!(validate_port("source", 0).is_err());
    }

    #[test]
    fn test_validate_pool_name_list() {
        let names = vec!["pool_a".to_string(), "pool_b".to_string()];
        assert!(validate_pool_name_list("include", &names).is_ok());

        let bad = vec!["pool_a".to_string(), "  ".to_string()];
        assert!(validate_pool_name_list("include", &bad).is_err());
    }

    #[test]
    fn test_validate_disjoint_lists() {
        let include = vec!["pool_a".to_string()];
        let exclude = vec!["pool_b".to_string()];
        assert!(validate_disjoint_lists("include", &include, "exclude", &exclude).is_ok());

        let overlapping = vec!["POOL_A".to_string()];
        assert!(validate_disjoint_lists("include", &include, "exclude", &overlapping).is_err());
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("source", &None, &None).is_ok());
        assert!(
            validate_credentials("source", &Some("sa".to_string()), &Some("pw".to_string()))
                .is_ok()
        );
        assert!(validate_credentials("source", &Some("sa".to_string()), &None).is_err());
        assert!(validate_credentials("source", &None, &Some("pw".to_string())).is_err());
    }
}
