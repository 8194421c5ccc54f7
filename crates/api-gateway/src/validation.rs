//! Field-level allow-lists, applied before a handler touches the
//! persistence layer (§4.8 step 1: "SQL/script-injection probes
//! rejected before handler dispatch").

use shared_types::CoordinatorError;

const MAX_IDENTIFIER_LEN: usize = 128;
const MAX_URL_LEN: usize = 2048;

pub fn identifier(field: &str, value: &str) -> Result<(), CoordinatorError> {
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN {
        return Err(CoordinatorError::validation(format!("{field} must be 1-{MAX_IDENTIFIER_LEN} characters")));
    }
    let ok = value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        return Err(CoordinatorError::validation(format!("{field} contains disallowed characters")));
    }
    Ok(())
}

pub fn hostname(value: &str) -> Result<(), CoordinatorError> {
    if value.is_empty() || value.len() > 253 {
        return Err(CoordinatorError::validation("hostname must be 1-253 characters"));
    }
    let ok = value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'));
    if !ok {
        return Err(CoordinatorError::validation("hostname contains disallowed characters"));
    }
    Ok(())
}

pub fn package_name(value: &str) -> Result<(), CoordinatorError> {
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN {
        return Err(CoordinatorError::validation("package name must be 1-128 characters"));
    }
    let ok = value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'));
    if !ok {
        return Err(CoordinatorError::validation("package name contains disallowed characters"));
    }
    Ok(())
}

pub fn version(value: &str) -> Result<(), CoordinatorError> {
    if value.is_empty() || value.len() > 128 {
        return Err(CoordinatorError::validation("version must be 1-128 characters"));
    }
    let ok = value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '+' | '~'));
    if !ok {
        return Err(CoordinatorError::validation("version contains disallowed characters"));
    }
    Ok(())
}

pub fn url(field: &str, value: &str) -> Result<(), CoordinatorError> {
    if value.is_empty() || value.len() > MAX_URL_LEN {
        return Err(CoordinatorError::validation(format!("{field} must be 1-{MAX_URL_LEN} characters")));
    }
    if !(value.starts_with("https://") || value.starts_with("http://") || value.starts_with("file://")) {
        return Err(CoordinatorError::validation(format!("{field} must use http(s):// or file://")));
    }
    if value.contains(['<', '>', '"', '\'', ';', '\0']) {
        return Err(CoordinatorError::validation(format!("{field} contains disallowed characters")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rejects_sql_probe() {
        assert!(identifier("name", "'; DROP TABLE endpoints; --").is_err());
    }

    #[test]
    fn identifier_accepts_normal_name() {
        assert!(identifier("name", "node-01.fleet_a").is_ok());
    }

    #[test]
    fn url_requires_known_scheme() {
        assert!(url("primary_url", "javascript:alert(1)").is_err());
        assert!(url("primary_url", "https://mirror.example/core").is_ok());
    }

    #[test]
    fn version_accepts_semver_like_strings() {
        assert!(version("1.2.3-rc.1+build.5").is_ok());
    }
}
