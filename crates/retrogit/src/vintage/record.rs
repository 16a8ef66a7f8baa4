use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a vintage record: one user in one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VintageKey {
    pub user_id: i64,
    pub repo_id: i64,
}

impl VintageKey {
    #[must_use]
    pub fn new(user_id: i64, repo_id: i64) -> Self {
        Self { user_id, repo_id }
    }
}

impl std::fmt::Display for VintageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.user_id, self.repo_id)
    }
}

/// A settled vintage. Both variants are final and never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "vintage", rename_all = "snake_case")]
pub enum Vintage {
    /// Earliest known commit date of the user in the repository.
    Final(DateTime<Utc>),
    /// The repository could not be read with the user's credential.
    Unresolvable,
}

impl Vintage {
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            Vintage::Final(date) => Some(*date),
            Vintage::Unresolvable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VintageRecord {
    pub key: VintageKey,
    pub vintage: Vintage,
    pub computed_at: DateTime<Utc>,
}

impl VintageRecord {
    #[must_use]
    pub fn new(key: VintageKey, vintage: Vintage) -> Self {
        Self {
            key,
            vintage,
            computed_at: Utc::now(),
        }
    }
}

/// What the resolver knows about a repository right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "vintage", rename_all = "snake_case")]
pub enum VintageResolution {
    Final(DateTime<Utc>),
    Unresolvable,
    /// Upstream statistics are still being computed; a retry is scheduled.
    Pending,
}

impl From<Vintage> for VintageResolution {
    fn from(vintage: Vintage) -> Self {
        match vintage {
            Vintage::Final(date) => VintageResolution::Final(date),
            Vintage::Unresolvable => VintageResolution::Unresolvable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_displays_as_user_dash_repo() {
        assert_eq!(VintageKey::new(42, 1296269).to_string(), "42-1296269");
    }

    #[test]
    fn vintage_serializes_as_tagged_value() {
        let date = Utc.with_ymd_and_hms(2019, 11, 25, 0, 0, 0).unwrap();
        assert_eq!(
            serde_json::to_value(Vintage::Final(date)).expect("json"),
            serde_json::json!({"status": "final", "vintage": "2019-11-25T00:00:00Z"})
        );
        assert_eq!(
            serde_json::to_value(Vintage::Unresolvable).expect("json"),
            serde_json::json!({"status": "unresolvable"})
        );
        assert_eq!(
            serde_json::to_value(VintageResolution::Pending).expect("json"),
            serde_json::json!({"status": "pending"})
        );
    }

    #[test]
    fn resolution_mirrors_vintage() {
        let date = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            VintageResolution::from(Vintage::Final(date)),
            VintageResolution::Final(date)
        );
        assert_eq!(Vintage::Final(date).date(), Some(date));
        assert_eq!(Vintage::Unresolvable.date(), None);
    }
}
