//! Flash commands for one or many boards.
//!
//! Flashing blocks on file I/O, sleeps and serial lines, so every board runs
//! on tokio's blocking pool with an orchestrator of its own.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::flasher::{FlashOrchestrator, FlashReport, FlashRequest, TargetDescriptor};
use crate::settings::FlasherSettings;

/// Flash a single board.
pub async fn flash_target(
    settings: FlasherSettings,
    request: FlashRequest,
) -> Result<FlashReport, String> {
    tokio::task::spawn_blocking(move || FlashOrchestrator::system(settings).flash_detailed(&request))
        .await
        .map_err(|e| format!("Flash task failed: {}", e))
}

/// Flash the same image onto several boards in parallel.
///
/// Reports come back in the order of `targets`.
pub async fn flash_many(
    settings: FlasherSettings,
    source: PathBuf,
    targets: Vec<TargetDescriptor>,
    suppress_reset: bool,
) -> Result<Vec<FlashReport>, String> {
    check_unique(&targets)?;

    let jobs = targets
        .into_iter()
        .map(|target| {
            let request = FlashRequest::new(source.clone(), target).suppress_reset(suppress_reset);
            (FlashOrchestrator::system(settings.clone()), request)
        })
        .collect();

    run_jobs(jobs).await
}

/// Run each orchestrator on its own blocking thread.
pub async fn run_jobs(
    jobs: Vec<(FlashOrchestrator, FlashRequest)>,
) -> Result<Vec<FlashReport>, String> {
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|(orchestrator, request)| {
            tokio::task::spawn_blocking(move || orchestrator.flash_detailed(&request))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .await
            .map_err(|e| format!("Flash task failed: {}", e))?;
        reports.push(report);
    }
    Ok(reports)
}

/// Read a JSON array of target descriptors.
pub fn load_targets(path: &Path) -> Result<Vec<TargetDescriptor>, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read target list {}: {}", path.display(), e))?;

    let targets: Vec<TargetDescriptor> = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse target list: {}", e))?;

    if targets.is_empty() {
        return Err(format!("Target list {} is empty", path.display()));
    }
    check_unique(&targets)?;

    Ok(targets)
}

/// Exit code for a batch: the first failing board's code, or 0.
pub fn batch_exit_code(reports: &[FlashReport]) -> i32 {
    reports
        .iter()
        .map(|r| r.outcome.exit_code())
        .find(|&code| code != 0)
        .unwrap_or(0)
}

// Two orchestrators driving one board would fight over its drive.
fn check_unique(targets: &[TargetDescriptor]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(target.target_id.as_str()) {
            return Err(format!(
                "target_id {} is listed more than once",
                target.target_id
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flasher::FlashOutcome;
    use crate::test_helpers::{
        fast_settings, BoardBehavior, FakeResetter, RecordingLog, SimulatedBoard, TargetBuilder,
        TestContext,
    };
    use std::sync::Arc;

    #[test]
    fn test_load_targets() {
        let ctx = TestContext::new();
        let path = ctx.create_file(
            "targets.json",
            r#"[
                {"target_id": "0240A", "mount_point": "/media/user/DAPLINK", "serial_port": "/dev/ttyACM0"},
                {"target_id": "0240B", "mount_point": "/media/user/DAPLINK1"}
            ]"#,
        );

        let targets = load_targets(&path).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(targets[1].serial_port, None);
    }

    #[test]
    fn test_load_targets_rejects_duplicates() {
        let ctx = TestContext::new();
        let path = ctx.create_file(
            "targets.json",
            r#"[
                {"target_id": "0240A", "mount_point": "/media/user/DAPLINK"},
                {"target_id": "0240A", "mount_point": "/media/user/DAPLINK1"}
            ]"#,
        );

        let err = load_targets(&path).unwrap_err();

        assert!(err.contains("0240A is listed more than once"));
    }

    #[test]
    fn test_load_targets_rejects_empty_list() {
        let ctx = TestContext::new();
        let path = ctx.create_file("targets.json", "[]");

        assert!(load_targets(&path).unwrap_err().contains("is empty"));
    }

    #[tokio::test]
    async fn test_flash_target_missing_image() {
        let ctx = TestContext::new();
        let target = TargetBuilder::new().mount_point(ctx.create_mount_point("DAPLINK")).build();
        let request = FlashRequest::new(ctx.path("missing.bin"), target);

        let report = flash_target(fast_settings(), request).await.unwrap();

        assert_eq!(
            report.outcome,
            FlashOutcome::IoError(std::io::ErrorKind::NotFound)
        );
        assert_eq!(report.image_sha256, None);
    }

    #[tokio::test]
    async fn test_run_jobs_keeps_input_order() {
        let ctx = TestContext::new();
        let source = ctx.create_file_bytes("blinky.bin", b"image");
        let log = Arc::new(RecordingLog::default());

        let boards = [
            ("0240A", "DAPLINK", BoardBehavior::Consume),
            ("0240B", "DAPLINK1", BoardBehavior::Fail("bad crc".into())),
            ("0240C", "DAPLINK2", BoardBehavior::Consume),
        ];
        let jobs = boards
            .into_iter()
            .map(|(tid, label, behavior)| {
                let target = TargetBuilder::new()
                    .target_id(tid)
                    .mount_point(ctx.create_mount_point(label))
                    .build();
                let orchestrator = FlashOrchestrator::new(
                    fast_settings(),
                    Arc::new(FakeResetter::default()),
                    Arc::new(SimulatedBoard::new(behavior)),
                    log.clone(),
                );
                (orchestrator, FlashRequest::new(&source, target))
            })
            .collect();

        let reports = run_jobs(jobs).await.unwrap();

        let ids: Vec<_> = reports.iter().map(|r| r.target_id.as_str()).collect();
        assert_eq!(ids, ["0240A", "0240B", "0240C"]);
        assert_eq!(reports[0].outcome, FlashOutcome::Success);
        assert_eq!(
            reports[1].outcome,
            FlashOutcome::DeviceReportedFailure("bad crc".into())
        );
        assert_eq!(batch_exit_code(&reports), 4);
    }

    #[tokio::test]
    async fn test_flash_many_rejects_duplicate_targets() {
        let target = TargetBuilder::new().build();

        let err = flash_many(
            fast_settings(),
            PathBuf::from("blinky.bin"),
            vec![target.clone(), target],
            false,
        )
        .await
        .unwrap_err();

        assert!(err.contains("listed more than once"));
    }

    #[test]
    fn test_batch_exit_code_all_success() {
        assert_eq!(batch_exit_code(&[]), 0);
    }
}
