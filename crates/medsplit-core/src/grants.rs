//! Micro-grant rules: request validation, requester naming, ordering,
//! donations, and progress.
//!
//! Grants are small cash requests (at most `max_amount`, 200 by default)
//! that community members fund in pieces. The functions here operate on
//! plain slices; persistence lives with the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Profile, User};

/// Default upper bound for a single grant request.
pub const DEFAULT_MAX_AMOUNT: f64 = 200.0;

const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Error, PartialEq)]
pub enum GrantError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Grant not found: {0}")]
    NotFound(u64),
}

/// A funding request as stored in the data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroGrant {
    pub id: u64,
    pub requester_name: String,
    pub title: String,
    pub description: String,
    pub amount_needed: f64,
    #[serde(default)]
    pub amount_raised: f64,
    #[serde(default)]
    pub time_posted: String,
    /// RFC 3339 timestamp. Older records may lack it.
    #[serde(rename = "created_at", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub supporters: u32,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(rename = "requestor_id", default)]
    pub requestor_id: Option<u64>,
}

impl MicroGrant {
    pub fn progress(&self) -> f64 {
        progress_percentage(self.amount_raised, self.amount_needed)
    }

    fn created_millis(&self) -> i64 {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Input for [`new_grant`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
}

/// `raised / needed × 100`; `0` when nothing is needed.
///
/// Not clamped: over-funded grants report more than 100.
pub fn progress_percentage(raised: f64, needed: f64) -> f64 {
    if needed == 0.0 {
        return 0.0;
    }
    raised / needed * 100.0
}

/// Sort newest first by `created_at`, then by id (desc).
///
/// Grants without a parseable timestamp sort as the Unix epoch.
pub fn sort_newest_first(grants: &mut [MicroGrant]) {
    grants.sort_by(|a, b| {
        b.created_millis()
            .cmp(&a.created_millis())
            .then(b.id.cmp(&a.id))
    });
}

/// Next free id: one past the current maximum, or `1` when empty.
pub fn next_id(grants: &[MicroGrant]) -> u64 {
    grants.iter().map(|g| g.id).max().map_or(1, |m| m + 1)
}

/// Display name for a requester.
///
/// Prefers the profile's full name, then the local part of the account
/// email (or the email supplied with the request). Requests without a
/// user id are always anonymous.
pub fn resolve_requester_name(
    user_id: Option<u64>,
    email: Option<&str>,
    profiles: &[Profile],
    users: &[User],
) -> String {
    let Some(user_id) = user_id.filter(|id| *id != 0) else {
        return ANONYMOUS.to_string();
    };

    if let Some(profile) = profiles.iter().find(|p| p.user_id == user_id) {
        let first = profile.first_name.as_deref().unwrap_or("").trim();
        let last = profile.last_name.as_deref().unwrap_or("").trim();
        let joined = format!("{} {}", first, last).trim().to_string();
        if !joined.is_empty() {
            return joined;
        }
    }

    let account_email = users
        .iter()
        .find(|u| u.id == user_id)
        .and_then(|u| u.email.as_deref())
        .filter(|e| !e.is_empty());

    match account_email.or(email.filter(|e| !e.is_empty())) {
        Some(addr) => match addr.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => ANONYMOUS.to_string(),
        },
        None => ANONYMOUS.to_string(),
    }
}

/// Validate a request and build the grant to store.
///
/// The caller prepends the result to its list.
pub fn new_grant(
    req: &GrantRequest,
    existing: &[MicroGrant],
    max_amount: f64,
    profiles: &[Profile],
    users: &[User],
    now: DateTime<Utc>,
) -> Result<MicroGrant, GrantError> {
    let title = req.title.trim();
    let description = req.description.trim();

    if title.is_empty() {
        return Err(GrantError::InvalidInput("title is required".into()));
    }
    if description.is_empty() {
        return Err(GrantError::InvalidInput("description is required".into()));
    }
    if !req.amount.is_finite() || req.amount < 1.0 || req.amount > max_amount {
        return Err(GrantError::InvalidInput(format!(
            "amount must be between 1 and {}",
            max_amount
        )));
    }

    let requester_name =
        resolve_requester_name(req.user_id, req.email.as_deref(), profiles, users);

    Ok(MicroGrant {
        id: next_id(existing),
        requester_name,
        title: title.to_string(),
        description: description.to_string(),
        amount_needed: req.amount,
        amount_raised: 0.0,
        time_posted: "just now".to_string(),
        created_at: Some(now.to_rfc3339()),
        supporters: 0,
        verified: false,
        urgent: false,
        requestor_id: req.user_id.filter(|id| *id != 0),
    })
}

/// Record a donation: add to `amount_raised` and count one more supporter.
pub fn apply_donation(
    grants: &mut [MicroGrant],
    id: u64,
    amount: f64,
) -> Result<&MicroGrant, GrantError> {
    if id == 0 || amount == 0.0 || !amount.is_finite() {
        return Err(GrantError::InvalidInput(
            "id and a non-zero amount are required".into(),
        ));
    }
    let grant = grants
        .iter_mut()
        .find(|g| g.id == id)
        .ok_or(GrantError::NotFound(id))?;
    grant.amount_raised += amount;
    grant.supporters += 1;
    Ok(&*grant)
}

/// Grants requested by `user_id`, in their current order.
pub fn for_requester(grants: &[MicroGrant], user_id: u64) -> Vec<&MicroGrant> {
    grants
        .iter()
        .filter(|g| g.requestor_id == Some(user_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn grant(id: u64, created_at: Option<&str>) -> MicroGrant {
        MicroGrant {
            id,
            requester_name: ANONYMOUS.into(),
            title: format!("grant {}", id),
            description: "help".into(),
            amount_needed: 100.0,
            amount_raised: 0.0,
            time_posted: "just now".into(),
            created_at: created_at.map(str::to_string),
            supporters: 0,
            verified: false,
            urgent: false,
            requestor_id: None,
        }
    }

    fn request(amount: f64) -> GrantRequest {
        GrantRequest {
            title: "  Insulin  ".into(),
            description: "Monthly supply".into(),
            amount,
            user_id: None,
            email: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_progress_percentage() {
        assert!((progress_percentage(60.0, 120.0) - 50.0).abs() < 1e-9);
        assert!((progress_percentage(150.0, 100.0) - 150.0).abs() < 1e-9);
        assert_eq!(progress_percentage(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_sort_newest_first_with_missing_dates() {
        let mut grants = vec![
            grant(1, Some("2024-01-01T00:00:00Z")),
            grant(2, None),
            grant(3, Some("2024-03-01T00:00:00Z")),
            grant(4, None),
        ];
        sort_newest_first(&mut grants);
        let ids: Vec<u64> = grants.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_next_id() {
        assert_eq!(next_id(&[]), 1);
        assert_eq!(next_id(&[grant(4, None), grant(2, None)]), 5);
    }

    #[test]
    fn test_new_grant_trims_and_defaults() {
        let existing = vec![grant(7, None)];
        let g = new_grant(&request(50.0), &existing, DEFAULT_MAX_AMOUNT, &[], &[], now()).unwrap();
        assert_eq!(g.id, 8);
        assert_eq!(g.title, "Insulin");
        assert_eq!(g.requester_name, "Anonymous");
        assert_eq!(g.amount_raised, 0.0);
        assert_eq!(g.supporters, 0);
        assert_eq!(g.time_posted, "just now");
        assert_eq!(g.created_at.as_deref(), Some("2024-02-01T12:00:00+00:00"));
        assert!(g.requestor_id.is_none());
    }

    #[test]
    fn test_new_grant_amount_bounds() {
        let ok = |amount| new_grant(&request(amount), &[], DEFAULT_MAX_AMOUNT, &[], &[], now());
        assert!(ok(1.0).is_ok());
        assert!(ok(200.0).is_ok());
        assert!(matches!(ok(0.0), Err(GrantError::InvalidInput(_))));
        assert!(matches!(ok(200.5), Err(GrantError::InvalidInput(_))));
        assert!(matches!(ok(f64::NAN), Err(GrantError::InvalidInput(_))));
    }

    #[test]
    fn test_new_grant_requires_text() {
        let mut req = request(20.0);
        req.description = "   ".into();
        let err = new_grant(&req, &[], DEFAULT_MAX_AMOUNT, &[], &[], now()).unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_requester_name_prefers_profile() {
        let profiles = vec![Profile {
            user_id: 5,
            first_name: Some(" Ada ".into()),
            last_name: Some("Lovelace".into()),
        }];
        let users = vec![User {
            id: 5,
            email: Some("ada@example.org".into()),
        }];
        assert_eq!(
            resolve_requester_name(Some(5), None, &profiles, &users),
            "Ada Lovelace"
        );
    }

    #[test]
    fn test_requester_name_falls_back_to_email() {
        let profiles = vec![Profile {
            user_id: 5,
            first_name: Some("".into()),
            last_name: None,
        }];
        let users = vec![User {
            id: 5,
            email: Some("ada@example.org".into()),
        }];
        assert_eq!(resolve_requester_name(Some(5), None, &profiles, &users), "ada");
        assert_eq!(
            resolve_requester_name(Some(9), Some("grace@navy.mil"), &profiles, &users),
            "grace"
        );
        assert_eq!(resolve_requester_name(Some(9), None, &profiles, &users), "Anonymous");
    }

    #[test]
    fn test_requester_name_without_user_is_anonymous() {
        assert_eq!(
            resolve_requester_name(None, Some("ada@example.org"), &[], &[]),
            "Anonymous"
        );
    }

    #[test]
    fn test_apply_donation() {
        let mut grants = vec![grant(1, None), grant(2, None)];
        let updated = apply_donation(&mut grants, 2, 25.0).unwrap();
        assert_eq!(updated.amount_raised, 25.0);
        assert_eq!(updated.supporters, 1);

        apply_donation(&mut grants, 2, 10.0).unwrap();
        assert_eq!(grants[1].amount_raised, 35.0);
        assert_eq!(grants[1].supporters, 2);
        assert!((grants[1].progress() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_donation_errors() {
        let mut grants = vec![grant(1, None)];
        assert_eq!(
            apply_donation(&mut grants, 3, 5.0).unwrap_err(),
            GrantError::NotFound(3)
        );
        assert!(matches!(
            apply_donation(&mut grants, 1, 0.0),
            Err(GrantError::InvalidInput(_))
        ));
        assert!(matches!(
            apply_donation(&mut grants, 0, 5.0),
            Err(GrantError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_for_requester() {
        let mut a = grant(1, None);
        a.requestor_id = Some(3);
        let b = grant(2, None);
        let grants = vec![a, b];
        let mine = for_requester(&grants, 3);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, 1);
    }

    #[test]
    fn test_grant_json_field_names() {
        let g = grant(1, Some("2024-01-01T00:00:00Z"));
        let v = serde_json::to_value(&g).unwrap();
        assert!(v.get("amountNeeded").is_some());
        assert!(v.get("requesterName").is_some());
        assert!(v.get("created_at").is_some());
        assert!(v.get("requestor_id").is_some());
    }
}
