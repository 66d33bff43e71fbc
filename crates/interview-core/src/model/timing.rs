use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionId;

const CSV_HEADER: &str =
    "username,start_time_unix,start_time_utc,end_time_unix,duration_seconds,duration_minutes";

/// Start/end timing written next to every transcript save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTiming {
    pub session_id: SessionId,
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl SessionTiming {
    /// Whole seconds between start and end; zero when the start is unknown.
    pub fn duration_seconds(&self) -> i64 {
        self.start
            .map(|start| (self.end - start).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// One header line plus one data row.
    pub fn to_csv(&self) -> String {
        let seconds = self.duration_seconds();
        let (start_unix, start_utc) = match self.start {
            Some(start) => (
                start.timestamp().to_string(),
                start.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            None => (String::new(), "N/A".to_string()),
        };
        format!(
            "{CSV_HEADER}\n{},{},{},{},{},{:.4}\n",
            self.session_id,
            start_unix,
            start_utc,
            self.end.timestamp(),
            seconds,
            seconds as f64 / 60.0
        )
    }
}
