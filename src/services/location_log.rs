use crate::models::GeoFix;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Append-only UTF-8 text log of location fixes, one line per fix.
#[derive(Debug, Clone)]
pub struct LocationLog {
    path: PathBuf,
}

impl LocationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Latitude: <f>, Longitude: <f>, Timestamp: <ISO8601>\n`
    pub fn format_line(fix: &GeoFix, written_at: DateTime<Utc>) -> String {
        format!(
            "Latitude: {}, Longitude: {}, Timestamp: {}\n",
            fix.latitude,
            fix.longitude,
            written_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    pub async fn append(&self, fix: &GeoFix) -> Result<()> {
        self.append_at(fix, Utc::now()).await
    }

    pub async fn append_at(&self, fix: &GeoFix, written_at: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.write_all(Self::format_line(fix, written_at).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_format() {
        let fix = GeoFix::new(37.4, -122.1);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(
            LocationLog::format_line(&fix, at),
            "Latitude: 37.4, Longitude: -122.1, Timestamp: 2024-05-01T08:30:00.000Z\n"
        );
    }

    #[tokio::test]
    async fn test_appends_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let log = LocationLog::new(dir.path().join("Download").join("location_data.txt"));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

        log.append_at(&GeoFix::new(1.5, 2.25), at).await.unwrap();
        log.append_at(&GeoFix::new(-3.0, 4.0), at).await.unwrap();

        let content = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Latitude: 1.5, Longitude: 2.25, Timestamp: 2024-05-01T08:30:00.000Z"
        );
        assert!(lines[1].starts_with("Latitude: -3, Longitude: 4,"));
    }
}
