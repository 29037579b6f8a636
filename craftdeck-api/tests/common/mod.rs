//! Shared helpers for craftdeck-api tests
//!
//! Builds the router over an in-memory `FakeStackApi` so tests can seed
//! stacks and inspect the calls the handlers made.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use chrono::{DateTime, Utc};
use craftdeck_client::fake::FakeStackApi;
use craftdeck_client::{BlueprintSummary, InfraUnit, UnitState};
use craftdeck_orchestrator::{EnvironmentService, ServiceSettings, TeardownSettings};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const BLUEPRINT_ID: &str = "minecraft-server";

pub fn create_test_app(api: Arc<FakeStackApi>) -> Router {
    let settings = ServiceSettings {
        blueprint_id: BLUEPRINT_ID.to_string(),
        teardown: TeardownSettings {
            settle_delay: Duration::ZERO,
            ..TeardownSettings::default()
        },
    };
    craftdeck_api::create_app(EnvironmentService::new(api, settings))
}

pub fn managed_stack(id: &str, name: &str, state: UnitState, created_secs: i64) -> InfraUnit {
    let created_at = DateTime::<Utc>::from_timestamp(created_secs, 0).expect("valid timestamp");
    InfraUnit::new(id, name, state, created_at).with_label("minecraft")
}

pub fn minecraft_blueprint() -> BlueprintSummary {
    BlueprintSummary {
        id: BLUEPRINT_ID.to_string(),
        name: "Minecraft server".to_string(),
        state: "PUBLISHED".to_string(),
    }
}

/// Fixture: the two stacks one blueprint deploy produces for token `ab12`
pub fn fixture_ab12() -> Arc<FakeStackApi> {
    Arc::new(FakeStackApi::with_stacks(vec![
        managed_stack(
            "x-opentofu-blueprint-ab12",
            "X-Opentofu-Blueprint-ab12",
            UnitState::Finished,
            1_700_000_000,
        )
        .with_output("ec2_ip", "1.2.3.4")
        .with_output("instance_type", "t3.medium")
        .with_input("max_players", "20"),
        managed_stack(
            "x-ansible-blueprint-ab12",
            "X-Ansible-Blueprint-ab12",
            UnitState::Finished,
            1_700_000_100,
        ),
    ]))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn send_json(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn send_empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Helper to extract a JSON body from a response
pub async fn extract_json_body<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}
