use crate::analysis::ScoredResult;
use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "alerts_";

/// One analysis cycle as written for the dashboard reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertLog {
    pub timestamp: String,
    pub alerts_count: usize,
    pub alerts: Vec<ScoredResult>,
}

pub fn alert_log_file_name(at: &DateTime<FixedOffset>) -> String {
    format!("{FILE_PREFIX}{}.json", at.format("%Y%m%d_%H%M"))
}

/// Writes the cycle log even when `alerts` is empty, so readers can tell the cycle ran.
///
/// Runs within the same minute overwrite each other.
pub async fn save_alert_log(
    dir: &Path,
    at: &DateTime<FixedOffset>,
    alerts: &[ScoredResult],
) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create alert log dir failed: {}", dir.display()))?;

    let log = AlertLog {
        timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
        alerts_count: alerts.len(),
        alerts: alerts.to_vec(),
    };
    let body = serde_json::to_vec_pretty(&log).context("serialize alert log failed")?;

    let path = dir.join(alert_log_file_name(at));
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("write alert log failed: {}", path.display()))?;

    tracing::info!(path = %path.display(), alerts = alerts.len(), "alert log saved");
    Ok(path)
}

/// Newest log written on `date`, if any.
pub async fn load_latest_alert_log(dir: &Path, date: NaiveDate) -> anyhow::Result<Option<AlertLog>> {
    let prefix = format!("{FILE_PREFIX}{}_", date.format("%Y%m%d"));

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("read alert log dir failed: {}", dir.display()))
        }
    };

    // File names embed HHMM, so the lexicographic maximum is the newest.
    let mut latest: Option<String> = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("iterate alert log dir failed")?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && name.ends_with(".json") && latest.as_ref() < Some(&name) {
            latest = Some(name);
        }
    }

    let Some(name) = latest else {
        return Ok(None);
    };

    let path = dir.join(&name);
    let body = tokio::fs::read(&path)
        .await
        .with_context(|| format!("read alert log failed: {}", path.display()))?;
    let log = serde_json::from_slice::<AlertLog>(&body)
        .with_context(|| format!("alert log is not valid JSON: {}", path.display()))?;
    Ok(Some(log))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("yada-alert-log-{}", uuid::Uuid::new_v4()))
    }

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(12600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, h, m, 0)
            .unwrap()
    }

    #[test]
    fn file_name_embeds_local_minute() {
        assert_eq!(alert_log_file_name(&at(9, 7)), "alerts_20261019_0907.json");
    }

    #[tokio::test]
    async fn empty_cycle_still_writes_a_log() {
        let dir = scratch_dir();
        let path = save_alert_log(&dir, &at(10, 0), &[]).await.unwrap();
        assert!(path.exists());

        let log = load_latest_alert_log(&dir, at(10, 0).date_naive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.alerts_count, 0);
        assert_eq!(log.timestamp, "2026-10-19 10:00:00");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn loads_newest_log_of_the_day() {
        let dir = scratch_dir();
        save_alert_log(&dir, &at(9, 30), &[]).await.unwrap();
        save_alert_log(&dir, &at(11, 15), &[]).await.unwrap();

        let log = load_latest_alert_log(&dir, at(0, 0).date_naive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.timestamp, "2026-10-19 11:15:00");

        let other_day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(load_latest_alert_log(&dir, other_day).await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_dir_means_no_log() {
        let dir = scratch_dir();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(load_latest_alert_log(&dir, date).await.unwrap().is_none());
    }
}
