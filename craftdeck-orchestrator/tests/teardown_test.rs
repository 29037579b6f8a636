//! Integration tests for ordered environment teardown
//!
//! Drives `Teardown` against the in-memory `FakeStackApi` and checks the order
//! of destructive calls. Most tests use a zero settle delay; the timing tests
//! run on paused tokio time with the default delay.

use chrono::{TimeZone, Utc};
use craftdeck_client::fake::{Call, FakeStackApi};
use craftdeck_client::{ClientError, InfraUnit, UnitState};
use craftdeck_orchestrator::{
    LogLevel, ServiceError, StepAction, StepStatus, Teardown, TeardownMode, TeardownOptions,
    TeardownSettings, SERVER_NOT_FOUND,
};
use std::time::Duration;
use tokio::time::Instant;

fn settings() -> TeardownSettings {
    TeardownSettings {
        settle_delay: Duration::ZERO,
        ..TeardownSettings::default()
    }
}

fn timed_settings() -> TeardownSettings {
    TeardownSettings {
        settle_delay: Duration::from_secs(10),
        ..TeardownSettings::default()
    }
}

fn managed(id: &str, name: &str, state: UnitState) -> InfraUnit {
    InfraUnit::new(id, name, state, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        .with_label("minecraft")
}

fn environment() -> FakeStackApi {
    FakeStackApi::with_stacks(vec![
        managed("tofu-ab12", "mc-Opentofu-Blueprint-ab12", UnitState::Finished),
        managed("ansible-ab12", "mc-Ansible-Blueprint-ab12", UnitState::Finished),
        managed("tofu-cd34", "mc-Opentofu-Blueprint-cd34", UnitState::Finished),
    ])
}

fn save() -> TeardownOptions {
    TeardownOptions {
        save_world_first: true,
    }
}

#[tokio::test]
async fn test_group_teardown_destroys_configuration_first() {
    let api = environment();
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(report.mode, TeardownMode::Group);
    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);
    assert_eq!(report.destroy_results.len(), 2);
    assert!(report
        .destroy_results
        .iter()
        .all(|r| r.status == StepStatus::Success));
    assert!(!report.world_saved);

    let remaining: Vec<_> = api.remaining_stacks().into_iter().map(|s| s.id).collect();
    assert_eq!(remaining, vec!["tofu-cd34"]);
}

#[tokio::test]
async fn test_partial_failure_still_destroys_provisioning() {
    let api = environment();
    api.fail_delete(
        "ansible-ab12",
        ClientError::Orchestrator("stack is locked".to_string()),
    );
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stack_id, "ansible-ab12");
    assert_eq!(failures[0].status, StepStatus::Error);
    assert!(failures[0]
        .error
        .as_deref()
        .unwrap()
        .contains("stack is locked"));

    assert_eq!(report.destroy_results[1].status, StepStatus::Success);
    assert!(report
        .status_updates
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message.contains("stack is locked")));
}

#[tokio::test]
async fn test_world_is_saved_before_destroy() {
    let api = environment();
    let settings = settings();

    let report = Teardown::new(&api, &settings).run("ab12", save()).await.unwrap();

    assert!(report.world_saved);
    assert!(report.save_task_id.is_some());
    assert_eq!(report.steps[0].action, StepAction::SaveState);
    assert_eq!(
        report.save_result.as_ref().map(|r| r.status),
        Some(StepStatus::Success)
    );

    let calls = api.calls();
    let task = calls
        .iter()
        .position(|c| matches!(c, Call::RunTask { stack_id, .. } if stack_id == "ansible-ab12"))
        .unwrap();
    let first_delete = calls
        .iter()
        .position(|c| matches!(c, Call::DeleteStack(_)))
        .unwrap();
    assert!(task < first_delete);
}

#[tokio::test]
async fn test_save_skipped_unless_configuration_finished() {
    let api = FakeStackApi::with_stacks(vec![
        managed("tofu-ab12", "mc-Opentofu-Blueprint-ab12", UnitState::Finished),
        managed("ansible-ab12", "mc-Ansible-Blueprint-ab12", UnitState::Applying),
    ]);
    let settings = settings();

    let report = Teardown::new(&api, &settings).run("ab12", save()).await.unwrap();

    assert!(!report.world_saved);
    assert!(!api.calls().iter().any(|c| matches!(c, Call::RunTask { .. })));
    assert!(report
        .status_updates
        .iter()
        .any(|e| e.level == LogLevel::Warning && e.message.contains("APPLYING")));
    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);
}

#[tokio::test]
async fn test_failed_save_does_not_stop_teardown() {
    let api = environment();
    api.fail_task(
        "ansible-ab12",
        ClientError::Transport("connection reset".to_string()),
    );
    let settings = settings();

    let report = Teardown::new(&api, &settings).run("ab12", save()).await.unwrap();

    assert!(!report.world_saved);
    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);

    let save = report.save_result.as_ref().unwrap();
    assert_eq!(save.stack_id, "ansible-ab12");
    assert_eq!(save.action, StepAction::SaveState);
    assert_eq!(save.status, StepStatus::Error);
    assert!(save.error.as_deref().unwrap().contains("connection reset"));
    assert!(report
        .destroy_results
        .iter()
        .all(|r| r.action == StepAction::Destroy));
}

#[tokio::test]
async fn test_unassigned_stack_id_tears_down_its_group() {
    let api = FakeStackApi::with_stacks(vec![
        managed("legacy", "survival", UnitState::Finished),
        managed("cfg", "survival-ansible", UnitState::Finished),
    ]);
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("legacy", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(report.mode, TeardownMode::Group);
    assert_eq!(api.deleted(), vec!["cfg", "legacy"]);
}

#[tokio::test]
async fn test_direct_provisioning_target_removes_partner_first() {
    let api = environment();
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("tofu-ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(report.mode, TeardownMode::Direct);
    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);
    assert!(report.steps[0].best_effort);
    assert!(!report.steps[1].best_effort);
}

#[tokio::test]
async fn test_direct_partner_failure_is_a_warning() {
    let api = environment();
    api.fail_delete(
        "ansible-ab12",
        ClientError::Orchestrator("stack is locked".to_string()),
    );
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("tofu-ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);
    assert_eq!(report.destroy_results[0].status, StepStatus::Warning);
    assert_eq!(report.destroy_results[1].status, StepStatus::Success);
}

#[tokio::test]
async fn test_direct_without_partner_destroys_target_only() {
    let api = environment();
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("tofu-cd34", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(api.deleted(), vec!["tofu-cd34"]);
    assert!(report
        .status_updates
        .iter()
        .any(|e| e.level == LogLevel::Warning));
}

#[tokio::test]
async fn test_direct_configuration_target_stands_alone() {
    let api = environment();
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("ansible-ab12", save())
        .await
        .unwrap();

    assert_eq!(report.mode, TeardownMode::Direct);
    assert_eq!(api.deleted(), vec!["ansible-ab12"]);
    assert!(!report.world_saved);
}

#[tokio::test]
async fn test_unlabeled_target_is_not_found() {
    let api = FakeStackApi::with_stacks(vec![InfraUnit::new(
        "foreign",
        "prod-Opentofu-Blueprint-zz99",
        UnitState::Finished,
        Utc::now(),
    )]);
    let settings = settings();

    let err = Teardown::new(&api, &settings)
        .run("foreign", TeardownOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(ref msg) if msg == SERVER_NOT_FOUND));
    assert!(api.deleted().is_empty());
}

#[tokio::test]
async fn test_unknown_group_is_not_found() {
    let api = environment();
    let settings = settings();

    let err = Teardown::new(&api, &settings)
        .run("zz99", TeardownOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(api.deleted().is_empty());
}

#[tokio::test]
async fn test_report_serializes_for_the_wire() {
    let api = environment();
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("ab12", TeardownOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["mode"], "group");
    assert_eq!(json["worldSaved"], false);
    assert_eq!(json["destroyResults"][0]["stackId"], "ansible-ab12");
    assert_eq!(json["destroyResults"][0]["status"], "success");
    assert_eq!(json["destroyResults"][0]["role"], "configuration");
    assert_eq!(json["destroyResults"][0]["action"], "destroy");
    assert!(json.get("saveResult").is_none());
    assert_eq!(json["steps"][0]["action"], "destroy");
    assert!(json["steps"][0].get("settle").is_none());
    assert!(json["statusUpdates"][0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_failed_save_is_reported_on_the_wire() {
    let api = environment();
    api.fail_task(
        "ansible-ab12",
        ClientError::Orchestrator("task rejected".to_string()),
    );
    let settings = settings();

    let report = Teardown::new(&api, &settings).run("ab12", save()).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["saveResult"]["action"], "saveState");
    assert_eq!(json["saveResult"]["status"], "error");
    assert_eq!(json["saveResult"]["stackId"], "ansible-ab12");
    assert!(json["saveResult"]["error"]
        .as_str()
        .unwrap()
        .contains("task rejected"));
}

#[tokio::test]
async fn test_shared_name_word_is_not_an_environment() {
    let api = FakeStackApi::with_stacks(vec![
        managed("tofu-ab12", "mc-Opentofu-Blueprint-ab12", UnitState::Finished),
        managed("ansible-ab12", "mc-Ansible-Blueprint-ab12", UnitState::Finished),
        managed("tofu-cd34", "mc-Opentofu-Blueprint-cd34", UnitState::Finished),
        managed("ansible-cd34", "mc-Ansible-Blueprint-cd34", UnitState::Finished),
    ]);
    let settings = settings();

    for target in ["blueprint", "Blueprint", "mc", "ansible", "opentofu", "ab"] {
        let err = Teardown::new(&api, &settings)
            .run(target, TeardownOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)), "{target}");
    }
    assert!(api.deleted().is_empty());
}

#[tokio::test]
async fn test_group_key_prefix_does_not_reach_other_environment() {
    let api = FakeStackApi::with_stacks(vec![
        managed("tofu-a1", "mc-Opentofu-Blueprint-a1", UnitState::Finished),
        managed("tofu-a12", "mc-Opentofu-Blueprint-a12", UnitState::Finished),
        managed("ansible-a12", "mc-Ansible-Blueprint-a12", UnitState::Finished),
    ]);
    let settings = settings();

    let report = Teardown::new(&api, &settings)
        .run("a1", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(report.mode, TeardownMode::Group);
    assert_eq!(api.deleted(), vec!["tofu-a1"]);
}

#[tokio::test]
async fn test_direct_partner_lookup_ignores_prefix_matches() {
    let api = FakeStackApi::with_stacks(vec![
        managed("tofu-a1", "mc-Opentofu-Blueprint-a1", UnitState::Finished),
        managed("tofu-a12", "mc-Opentofu-Blueprint-a12", UnitState::Finished),
        managed("ansible-a12", "mc-Ansible-Blueprint-a12", UnitState::Finished),
    ]);
    let settings = settings();

    Teardown::new(&api, &settings)
        .run("tofu-a1", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(api.deleted(), vec!["tofu-a1"]);
}

#[tokio::test(start_paused = true)]
async fn test_settle_waits_after_save_and_configuration_destroy() {
    let api = environment();
    let settings = timed_settings();
    let start = Instant::now();

    Teardown::new(&api, &settings).run("ab12", save()).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(20));
    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);
}

#[tokio::test(start_paused = true)]
async fn test_settle_between_configuration_and_provisioning() {
    let api = environment();
    let settings = timed_settings();
    let start = Instant::now();

    Teardown::new(&api, &settings)
        .run("ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_settle_follows_configuration_destroy_even_when_it_fails() {
    let api = environment();
    api.fail_delete(
        "ansible-ab12",
        ClientError::Orchestrator("stack is locked".to_string()),
    );
    let settings = timed_settings();
    let start = Instant::now();

    Teardown::new(&api, &settings)
        .run("ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_no_settle_after_failed_save() {
    let api = environment();
    api.fail_task(
        "ansible-ab12",
        ClientError::Transport("connection reset".to_string()),
    );
    let settings = timed_settings();
    let start = Instant::now();

    Teardown::new(&api, &settings).run("ab12", save()).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_configuration_only_group_does_not_wait() {
    let api = FakeStackApi::with_stacks(vec![managed(
        "ansible-ef56",
        "mc-Ansible-Blueprint-ef56",
        UnitState::Finished,
    )]);
    let settings = timed_settings();
    let start = Instant::now();

    Teardown::new(&api, &settings)
        .run("ef56", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_direct_mode_waits_only_after_partner_is_destroyed() {
    let api = environment();
    let settings = timed_settings();
    let start = Instant::now();

    Teardown::new(&api, &settings)
        .run("tofu-ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_direct_mode_skips_wait_when_partner_destroy_fails() {
    let api = environment();
    api.fail_delete(
        "ansible-ab12",
        ClientError::Orchestrator("stack is locked".to_string()),
    );
    let settings = timed_settings();
    let start = Instant::now();

    let report = Teardown::new(&api, &settings)
        .run("tofu-ab12", TeardownOptions::default())
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(report.destroy_results[0].status, StepStatus::Warning);
    assert_eq!(api.deleted(), vec!["ansible-ab12", "tofu-ab12"]);
}
