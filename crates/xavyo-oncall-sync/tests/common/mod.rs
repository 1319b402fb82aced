//! Common test utilities for xavyo-oncall-sync integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};
use xavyo_connector_incidentio::{Clock, IncidentIoClient, IncidentIoConfig, RateLimitConfig};
use xavyo_oncall_sync::{
    IdentityResolver, MemoryAccountDirectory, MemoryGroupStore, ReconciliationConfig,
    ReconciliationEngine,
};

/// Upstream user id for a person.
pub fn user_id(name: &str) -> String {
    format!("U-{name}")
}

/// Email for a person.
pub fn email(name: &str) -> String {
    format!("{name}@example.com")
}

#[derive(Default)]
struct UpstreamState {
    schedules: Vec<(String, String)>,
    on_call: HashMap<String, Vec<Value>>,
    users: HashMap<String, Value>,
    failing: HashSet<String>,
    inventory_down: bool,
}

/// Stateful incident.io stand-in serving schedules, entries and users.
#[derive(Clone, Default)]
pub struct Upstream {
    state: Arc<Mutex<UpstreamState>>,
}

impl Upstream {
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("GET"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    pub fn add_schedule(&self, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .schedules
            .push((id.to_string(), name.to_string()));
    }

    pub fn rename_schedule(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(schedule) = state.schedules.iter_mut().find(|(sid, _)| sid == id) {
            schedule.1 = name.to_string();
        }
    }

    pub fn remove_schedule(&self, id: &str) {
        self.state.lock().unwrap().schedules.retain(|(sid, _)| sid != id);
    }

    /// Puts the named people on call for `schedule_id`, replacing anyone before.
    /// Each person also gets a user record.
    pub fn set_on_call(&self, schedule_id: &str, names: &[&str]) {
        for name in names {
            self.add_user(&user_id(name), name, &email(name));
        }
        let users = names
            .iter()
            .map(|name| json!({ "id": user_id(name), "name": name, "email": email(name) }))
            .collect();
        self.set_on_call_users(schedule_id, users);
    }

    /// Puts raw entry user snapshots on call.
    pub fn set_on_call_users(&self, schedule_id: &str, users: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .on_call
            .insert(schedule_id.to_string(), users);
    }

    /// Registers a full user record served by `/v2/users/{id}`.
    pub fn add_user(&self, id: &str, name: &str, email: &str) {
        self.state.lock().unwrap().users.insert(
            id.to_string(),
            json!({ "id": id, "name": name, "email": email, "role": "responder" }),
        );
    }

    /// Deletes a user record. Entries naming the user are kept.
    pub fn delete_user(&self, id: &str) {
        self.state.lock().unwrap().users.remove(id);
    }

    /// Makes entry listing for `schedule_id` answer 500.
    pub fn fail_schedule(&self, schedule_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(schedule_id.to_string());
    }

    pub fn set_inventory_down(&self, down: bool) {
        self.state.lock().unwrap().inventory_down = down;
    }
}

fn error_response(status: u16, error_type: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "type": error_type,
        "status": status,
        "message": message,
        "request_id": "req-sim"
    }))
}

fn list_response(key: &str, items: Vec<Value>) -> ResponseTemplate {
    let mut body = json!({
        "pagination_meta": { "after": "", "page_size": 250, "total_record_count": items.len() }
    });
    body[key] = Value::Array(items);
    ResponseTemplate::new(200).set_body_json(body)
}

impl Respond for Upstream {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let state = self.state.lock().unwrap();
        let path = request.url.path();

        if path == "/v2/schedules" {
            if state.inventory_down {
                return error_response(503, "service_unavailable", "maintenance");
            }
            let schedules = state
                .schedules
                .iter()
                .map(|(id, name)| json!({ "id": id, "name": name, "timezone": "UTC" }))
                .collect();
            return list_response("schedules", schedules);
        }

        if path == "/v2/schedule_entries" {
            let schedule_id = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "schedule_id")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            if state.failing.contains(&schedule_id) {
                return error_response(500, "internal_error", "entries unavailable");
            }
            let entries = state
                .on_call
                .get(&schedule_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(i, user)| {
                    json!({
                        "entry_id": format!("{schedule_id}-entry-{i}"),
                        "schedule_id": schedule_id,
                        "start_at": "2020-01-01T00:00:00Z",
                        "end_at": "2099-01-01T00:00:00Z",
                        "user": user
                    })
                })
                .collect();
            return list_response("schedule_entries", entries);
        }

        if let Some(id) = path.strip_prefix("/v2/users/") {
            return match state.users.get(id) {
                Some(user) => ResponseTemplate::new(200).set_body_json(json!({ "user": user })),
                None => error_response(404, "not_found", "user not found"),
            };
        }

        error_response(404, "not_found", "no such route")
    }
}

/// Clock frozen at a fixed instant. Sleeps return immediately.
#[derive(Debug)]
pub struct FixedClock(pub DateTime<Utc>);

#[async_trait]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    async fn sleep(&self, _duration: Duration) {}
}

pub fn test_client(server: &MockServer) -> IncidentIoClient {
    let config = IncidentIoConfig::builder()
        .api_key("test-api-key")
        .base_url(server.uri())
        .rate_limit(RateLimitConfig::new(1000))
        .build()
        .unwrap();
    IncidentIoClient::new(config).unwrap()
}

/// Simulated upstream plus in-memory platform stores.
pub struct Harness {
    pub server: MockServer,
    pub upstream: Upstream,
    pub groups: Arc<MemoryGroupStore>,
    pub directory: Arc<MemoryAccountDirectory>,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let upstream = Upstream::default();
        upstream.mount(&server).await;
        Self {
            server,
            upstream,
            groups: Arc::new(MemoryGroupStore::new()),
            directory: Arc::new(MemoryAccountDirectory::new()),
        }
    }

    pub fn client(&self) -> IncidentIoClient {
        test_client(&self.server)
    }

    /// Registers platform accounts whose id is the person's name.
    pub async fn add_accounts(&self, names: &[&str]) {
        for name in names {
            self.directory.insert(&email(name), name).await;
        }
    }

    /// Creates empty target groups.
    pub async fn add_groups(&self, group_ids: &[&str]) {
        for group_id in group_ids {
            self.groups.insert_group(group_id, Vec::<String>::new()).await;
        }
    }

    /// Email-matching engine that looks up every on-call user's record.
    pub fn engine(&self, config: ReconciliationConfig) -> ReconciliationEngine {
        let client = self.client();
        let resolver =
            IdentityResolver::email(self.directory.clone()).with_user_lookup(client.clone());
        ReconciliationEngine::new(client, resolver, self.groups.clone(), config).unwrap()
    }

    pub fn default_engine(&self) -> ReconciliationEngine {
        self.engine(ReconciliationConfig::default())
    }

    pub async fn members(&self, group_id: &str) -> Vec<String> {
        self.groups.members(group_id).await.into_iter().collect()
    }
}
