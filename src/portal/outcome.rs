//! Login outcome cascade
//!
//! The portal has no documented success signal. After submitting the form we
//! collect what is observable into a `LoginSnapshot` and walk an ordered rule list;
//! the first rule that produces an outcome wins. Content checks come before the
//! URL-only check, which is the weakest signal.

use super::heviton;
use crate::error::AuthFailure;

/// Observations taken once the URL has left the processing endpoint
#[derive(Debug, Clone, Default)]
pub struct LoginSnapshot {
    /// Text of the alert overlay, when the overlay is displayed
    pub popup_text: Option<String>,
    pub url: String,
    pub page_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Logged in; the name of the rule that confirmed it
    Authenticated(&'static str),
    Rejected(AuthFailure),
}

type Rule = fn(&LoginSnapshot) -> Option<LoginOutcome>;

/// Evaluated top-down. Order is the precedence contract.
pub const CASCADE: &[(&str, Rule)] = &[
    ("popup", popup_rule),
    ("failure-url", failure_url_rule),
    ("session-markers", session_marker_rule),
    ("authenticated-url", authenticated_url_rule),
];

pub fn decide(snapshot: &LoginSnapshot) -> LoginOutcome {
    CASCADE
        .iter()
        .find_map(|(name, rule)| {
            let outcome = rule(snapshot)?;
            tracing::debug!("Login outcome decided by rule '{}'", name);
            Some(outcome)
        })
        .unwrap_or_else(|| {
            LoginOutcome::Rejected(AuthFailure::Unrecognized {
                url: snapshot.url.clone(),
            })
        })
}

fn popup_rule(snapshot: &LoginSnapshot) -> Option<LoginOutcome> {
    let text = snapshot.popup_text.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(LoginOutcome::Rejected(AuthFailure::Popup(text.to_string())))
}

fn failure_url_rule(snapshot: &LoginSnapshot) -> Option<LoginOutcome> {
    if snapshot.url.contains(heviton::IDENTIFIER_NOT_FOUND_MARKER) {
        Some(LoginOutcome::Rejected(AuthFailure::IdentifierNotFound))
    } else if snapshot.url.contains(heviton::SECRET_MISMATCH_MARKER) {
        Some(LoginOutcome::Rejected(AuthFailure::SecretMismatch))
    } else {
        None
    }
}

fn session_marker_rule(snapshot: &LoginSnapshot) -> Option<LoginOutcome> {
    let source = &snapshot.page_source;

    let user_info = source.contains("user_id") || source.contains("user in");
    let menu = source.contains("모니터링") && source.contains("설비상태");
    let greeting = source.contains("님")
        && (source.contains("로그아웃") || source.to_lowercase().contains("logout"));

    (user_info || menu || greeting).then_some(LoginOutcome::Authenticated("session-markers"))
}

fn authenticated_url_rule(snapshot: &LoginSnapshot) -> Option<LoginOutcome> {
    // The login page itself lives under /monitoring/login/
    if snapshot.url.contains("/login/") {
        return None;
    }
    heviton::AUTHENTICATED_PATHS
        .iter()
        .any(|path| snapshot.url.contains(path))
        .then_some(LoginOutcome::Authenticated("authenticated-url"))
}
