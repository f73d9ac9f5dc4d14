use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use crate::domain::{
    error::DomainError,
    models::{Actor, Principal},
};

/// Extract a bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Extract the `token` query parameter from a raw query string. Websocket
/// clients authenticate this way because browsers cannot set headers on a
/// websocket upgrade.
#[must_use]
pub fn query_token(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "token" && !value.is_empty() {
            Some(value.to_owned())
        } else {
            None
        }
    })
}

#[must_use]
pub fn admin_token_matches(expected: Option<&str>, provided: &str) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// The synthetic principal the configured admin token resolves to. It never
/// appears in the principal table.
#[must_use]
pub fn admin_principal(booted_at: DateTime<Utc>) -> Principal {
    Principal {
        id: "admin".to_owned(),
        username: "admin".to_owned(),
        email: String::new(),
        is_active: true,
        is_admin: true,
        created_at: booted_at,
    }
}

pub fn require_principal(actor: &Actor) -> Result<&Principal, DomainError> {
    actor
        .principal()
        .filter(|principal| principal.is_active)
        .ok_or_else(|| DomainError::Unauthorized("a valid bearer token is required".to_owned()))
}
