// Integration tests for the registry snapshot and TTL-based eviction.

use anyhow::Result;
use chrono::Utc;
use fieldtape::registry::SessionRegistry;
use std::path::Path;
use tempfile::TempDir;

const TTL_HOURS: f64 = 72.0;

fn make_session(root: &Path, recorder: &str, session_id: &str) {
    let dir = root.join(recorder).join(session_id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("data.wav"), b"wav").unwrap();
}

fn epoch_id_hours_ago(hours: f64) -> String {
    let now = Utc::now().timestamp_nanos_opt().unwrap();
    let offset = (hours * 3_600_000_000_000.0) as i64;
    (now - offset).to_string()
}

#[tokio::test]
async fn reports_live_sessions_with_remaining_ttl() -> Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().to_path_buf();

    let fresh = epoch_id_hours_ago(1.0);
    make_session(&root, "rec01", &fresh);

    let registry = SessionRegistry::new(root, TTL_HOURS);
    registry.refresh().await?;

    let snapshot = registry.snapshot().await;
    let sessions = &snapshot["rec01"].open_sessions;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, fresh);
    assert_eq!(sessions[0].wav_file_name, "data.wav");
    assert!(
        sessions[0].hours_to_live > 70.5 && sessions[0].hours_to_live < 71.5,
        "one-hour-old session should have ~71h left, got {}",
        sessions[0].hours_to_live
    );

    Ok(())
}

#[tokio::test]
async fn evicts_expired_sessions_from_disk_and_snapshot() -> Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().to_path_buf();

    let fresh = epoch_id_hours_ago(1.0);
    let expired = epoch_id_hours_ago(100.0);
    make_session(&root, "rec01", &fresh);
    make_session(&root, "rec01", &expired);

    let registry = SessionRegistry::new(root.clone(), TTL_HOURS);
    registry.refresh().await?;

    let snapshot = registry.snapshot().await;
    let sessions = &snapshot["rec01"].open_sessions;
    assert_eq!(sessions.len(), 1, "only the live session remains");
    assert_eq!(sessions[0].id, fresh);

    assert!(!root.join("rec01").join(&expired).exists(), "expired session is deleted");
    assert!(root.join("rec01").join(&fresh).exists());

    Ok(())
}

#[tokio::test]
async fn sessions_are_grouped_per_recorder() -> Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().to_path_buf();

    let a = epoch_id_hours_ago(1.0);
    let b = epoch_id_hours_ago(2.0);
    make_session(&root, "alpha", &a);
    make_session(&root, "beta", &b);

    let registry = SessionRegistry::new(root, TTL_HOURS);
    registry.refresh().await?;

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot["alpha"].open_sessions.len(), 1);
    assert_eq!(snapshot["alpha"].open_sessions[0].id, a);
    assert_eq!(snapshot["beta"].open_sessions.len(), 1);
    assert_eq!(snapshot["beta"].open_sessions[0].id, b);

    Ok(())
}

#[tokio::test]
async fn hidden_directories_are_ignored() -> Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().to_path_buf();

    let fresh = epoch_id_hours_ago(1.0);
    make_session(&root, "rec01", &fresh);

    // Seal work-in-progress under a hidden directory must not show up.
    std::fs::create_dir_all(root.join(".work").join("rec01-in-flight"))?;
    std::fs::create_dir_all(root.join("rec01").join(".partial"))?;

    let registry = SessionRegistry::new(root, TTL_HOURS);
    registry.refresh().await?;

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot["rec01"].open_sessions.len(), 1);

    Ok(())
}

#[tokio::test]
async fn failed_scan_keeps_previous_snapshot() -> Result<()> {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("sessions");
    std::fs::create_dir_all(&root)?;

    let fresh = epoch_id_hours_ago(1.0);
    make_session(&root, "rec01", &fresh);

    let registry = SessionRegistry::new(root.clone(), TTL_HOURS);
    registry.refresh().await?;
    assert_eq!(registry.snapshot().await.len(), 1);

    // A session directory that is not an epoch aborts the pass.
    std::fs::create_dir_all(root.join("rec01").join("not-an-epoch"))?;
    assert!(registry.refresh().await.is_err());

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 1, "published snapshot stays intact");
    assert_eq!(snapshot["rec01"].open_sessions[0].id, fresh);

    Ok(())
}
