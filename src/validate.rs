// Form input validation
// Runs before anything touches storage or credentials

use crate::coin::Coin;
use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

static ADMIN_LOGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]*[A-Za-z0-9_][A-Za-z0-9._-]*$").expect("valid regex"));

pub fn admin_login(raw: &str) -> Result<String, ValidationError> {
    let login = raw.trim();
    if login.is_empty() {
        return Err(ValidationError("blank login"));
    }
    if !ADMIN_LOGIN_RE.is_match(login) {
        return Err(ValidationError("invalid login format"));
    }
    Ok(login.to_string())
}

pub fn project_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError("invalid project name"));
    }
    Ok(name.to_string())
}

pub fn email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ValidationError("blank email"));
    }
    if !email.contains('@') {
        return Err(ValidationError("invalid email format"));
    }
    Ok(email.to_string())
}

pub fn user_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError("blank name"));
    }
    Ok(name.to_string())
}

pub fn address(raw: &str) -> Result<String, ValidationError> {
    let address = raw.trim();
    if address.is_empty() {
        return Err(ValidationError("invalid address format"));
    }
    Ok(address.to_string())
}

pub fn coin(raw: &str) -> Result<Coin, ValidationError> {
    raw.parse().map_err(|_| ValidationError("invalid coin"))
}

/// Numeric identifier from a path segment
pub fn id(raw: &str, invalid: &'static str) -> Result<i64, ValidationError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError(invalid)),
    }
}

/// Post-login target: only local absolute paths are kept
pub fn redirect_path(raw: Option<&str>) -> Option<String> {
    let path = raw?;
    if !path.starts_with('/') || path.starts_with("//") || path.starts_with("/\\") {
        return None;
    }
    Some(path.to_string())
}
