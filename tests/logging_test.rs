/*!
 * File logging driven by configuration
 *
 * Kept in its own test binary: the global subscriber can only be installed
 * once per process.
 */

use permsync::logging::init_logging;
use permsync::testing::{FakeDevice, RecordingBackend};
use permsync::{
    Collaborators, LogLevel, MonitorConfig, PackageRecord, PermSyncError, PermissionMonitor, Uid,
    UidRange,
};
use std::sync::Arc;

#[test]
fn test_init_logging_writes_json_events_to_log_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("permsync.log");
    let config = MonitorConfig {
        log_level: LogLevel::Debug,
        log_file: Some(log_path.clone()),
        ..Default::default()
    };
    init_logging(&config)?;

    let device = Arc::new(FakeDevice::new(29));
    device.install(
        PackageRecord::new("com.example.app", Uid(10001))
            .with_permissions(["android.permission.INTERNET"]),
    );
    let monitor = PermissionMonitor::new(
        Collaborators::from_device(device),
        RecordingBackend::new(),
        config.clone(),
    )?;
    monitor.start_monitoring()?;
    monitor.on_vpn_uid_ranges_added("tun0", &[UidRange::new(0, 99_999)?], Uid(10002))?;

    let contents = std::fs::read_to_string(&log_path)?;
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    let created = events
        .iter()
        .find(|event| event["fields"]["message"] == "permission monitor created")
        .ok_or_else(|| anyhow::anyhow!("no creation event in {contents}"))?;
    assert_eq!(created["level"], "INFO");
    assert_eq!(created["target"], "permsync::monitor");

    // Member crates log under their own targets
    assert!(events
        .iter()
        .any(|event| event["target"] == "permsync_core_vpn::tracker"
            && event["fields"]["message"] == "VPN ranges added"));

    match init_logging(&MonitorConfig::default()) {
        Err(err @ PermSyncError::Config(_)) => {
            assert!(err.to_string().contains("already initialized"))
        }
        Err(other) => anyhow::bail!("unexpected error: {other}"),
        Ok(()) => anyhow::bail!("second subscriber installed"),
    }
    Ok(())
}
