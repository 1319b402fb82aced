//! Wire models for the incident.io v2 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treats JSON `null` like a missing field.
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An on-call schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub timezone: String,
}

/// An incident.io user. May disappear upstream while still referenced by entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub role: String,
}

/// User snapshot embedded in a schedule entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUser {
    #[serde(default, deserialize_with = "null_to_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub email: String,
}

/// One on-call assignment overlapping the queried window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(default, deserialize_with = "null_to_default")]
    pub entry_id: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub schedule_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub user: EntryUser,
}

/// Cursor metadata returned by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Cursor for the next page. Empty or absent on the last page.
    #[serde(default, deserialize_with = "null_to_default")]
    pub after: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub page_size: u32,
    #[serde(default, deserialize_with = "null_to_default")]
    pub total_record_count: u64,
}

impl PaginationMeta {
    /// The next cursor, or `None` on the last page.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        if self.after.is_empty() {
            None
        } else {
            Some(&self.after)
        }
    }
}

/// `GET /v2/schedules` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListSchedulesResponse {
    #[serde(default, deserialize_with = "null_to_default")]
    pub schedules: Vec<Schedule>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub pagination_meta: PaginationMeta,
}

/// `GET /v2/schedules/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GetScheduleResponse {
    pub schedule: Schedule,
}

/// `GET /v2/schedule_entries` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEntriesResponse {
    #[serde(default, deserialize_with = "null_to_default")]
    pub schedule_entries: Vec<ScheduleEntry>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub pagination_meta: PaginationMeta,
}

/// `GET /v2/users` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListUsersResponse {
    #[serde(default, deserialize_with = "null_to_default")]
    pub users: Vec<User>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub pagination_meta: PaginationMeta,
}

/// `GET /v2/users/{id}` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GetUserResponse {
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_fields_become_empty() {
        let schedule: Schedule =
            serde_json::from_str(r#"{"id": "sched-null", "name": null, "timezone": null}"#)
                .unwrap();
        assert_eq!(schedule.id, "sched-null");
        assert_eq!(schedule.name, "");
        assert_eq!(schedule.timezone, "");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let user: User = serde_json::from_str(
            r#"{"id": "U1", "name": "Alice", "email": "alice@example.com", "role": "responder", "slack_user_id": "S1"}"#,
        )
        .unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, "responder");
    }

    #[test]
    fn test_entry_parsing() {
        let entry: ScheduleEntry = serde_json::from_str(
            r#"{
                "entry_id": "E1",
                "schedule_id": "S1",
                "start_at": "2026-01-01T09:00:00Z",
                "end_at": "2026-01-01T17:00:00Z",
                "user": {"id": "U1", "name": "Alice", "email": "alice@example.com"}
            }"#,
        )
        .unwrap();
        assert_eq!(entry.user.id, "U1");
        assert!(entry.end_at > entry.start_at);
    }

    #[test]
    fn test_entry_without_user() {
        let entry: ScheduleEntry = serde_json::from_str(
            r#"{"entry_id": "E1", "schedule_id": "S1", "start_at": "2026-01-01T09:00:00Z", "end_at": "2026-01-01T17:00:00Z", "user": null}"#,
        )
        .unwrap();
        assert!(entry.user.id.is_empty());
    }

    #[test]
    fn test_pagination_cursor() {
        let last = PaginationMeta::default();
        assert_eq!(last.next_cursor(), None);

        let more = PaginationMeta {
            after: "cursor-2".into(),
            page_size: 250,
            total_record_count: 500,
        };
        assert_eq!(more.next_cursor(), Some("cursor-2"));
    }

    #[test]
    fn test_empty_object_is_empty_page() {
        let response: ListUsersResponse = serde_json::from_str("{}").unwrap();
        assert!(response.users.is_empty());
        assert!(serde_json::from_str::<GetUserResponse>("{}").is_err());
    }

    #[test]
    fn test_missing_pagination_meta() {
        let response: ListSchedulesResponse =
            serde_json::from_str(r#"{"schedules": [{"id": "S1", "name": "Primary", "timezone": "UTC"}]}"#)
                .unwrap();
        assert_eq!(response.schedules.len(), 1);
        assert_eq!(response.pagination_meta.next_cursor(), None);
    }
}
