use super::{ExportDocument, ExportJob, Workout};
use crate::metrics_helper;
use crate::normalize::normalize;
use crate::strava_client::{ApiError, RawActivity, RawActivityDetail};
use crate::token_provider::TokenKind;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use function_timer::time;
use tracing::{error, info};

/// Upper bound on one listing window, to keep responses small and losses
/// local when a window fails.
const WINDOW_DAYS: i64 = 7;
const PER_PAGE: u32 = 200;

impl ExportJob {
    #[time("run_export_duration")]
    pub async fn run_export(&self) -> Result<()> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.days_back);

        let mut document = match self.load_snapshot().await? {
            Some(document) => document,
            None => ExportDocument::new_empty(now),
        };

        // Watermark is inclusive: the newest stored workout is re-listed and
        // absorbed by the dedup step below.
        let since = document.watermark().unwrap_or(cutoff);
        info!(
            "Fetching activities between {since} and {now} (retention cutoff {cutoff})"
        );

        let details = self.fetch_since(&document, since, now).await?;
        let fresh: Vec<Workout> = details.iter().map(normalize).collect();

        let (added, duplicate) = document.merge_new(fresh);
        let pruned = document.prune_older_than(cutoff);
        document.sort_by_start_date_desc();
        document.stamp(now);

        metrics_helper::increment_workouts_fetched_new(added as u64);
        metrics_helper::increment_workouts_pruned_stale(pruned as u64);
        info!(
            "Export contains {} workouts ({added} new, {duplicate} duplicate, {pruned} pruned)",
            document.workouts.len()
        );

        self.save_snapshot(&document).await?;
        Ok(())
    }

    /// Fetch detail records for every activity started in `[since, until)`,
    /// walking consecutive windows oldest-first. A failed window listing is
    /// logged and skipped; a failed detail fetch aborts the run, since a
    /// workout without its laps is not valid output.
    #[time("fetch_activities_duration")]
    async fn fetch_since(
        &self,
        known: &ExportDocument,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<RawActivityDetail>> {
        let token = self.tokens.get_valid_token(TokenKind::Activity).await?;

        let mut details = Vec::new();
        for (start, end) in fetch_windows(since, until) {
            let summaries = match self.list_window(&token, start, end).await {
                Ok(summaries) => summaries,
                Err(e) => {
                    error!("Failed to list activities between {start} and {end}, skipping window: {e}");
                    metrics_helper::increment_fetch_windows_skipped();
                    continue;
                }
            };

            for summary in summaries {
                if known.contains(&summary.id.to_string()) {
                    metrics_helper::increment_workouts_skipped_duplicate(1);
                    continue;
                }

                info!(
                    "Fetching detail for activity: {} (ID: {})",
                    summary.name, summary.id
                );
                let detail = self
                    .strava
                    .get_activity(&token, summary.id)
                    .await
                    .with_context(|| {
                        format!("failed to fetch detail for activity {}", summary.id)
                    })?;
                details.push(detail);
            }
        }

        Ok(details)
    }

    async fn list_window(
        &self,
        token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawActivity>, ApiError> {
        let mut activities = Vec::new();
        let mut page = 1;
        loop {
            let batch = self
                .strava
                .list_activities(token, start.timestamp(), end.timestamp(), page, PER_PAGE)
                .await?;
            let last_page = batch.len() < PER_PAGE as usize;
            activities.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }
        Ok(activities)
    }
}

/// Partition `[since, until)` into consecutive windows of at most
/// `WINDOW_DAYS` days, oldest first.
fn fetch_windows(
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut windows = Vec::new();
    let mut start = since;
    while start < until {
        let end = (start + Duration::days(WINDOW_DAYS)).min(until);
        windows.push((start, end));
        start = end;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_windows_cover_range_oldest_first() {
        let since = date("2024-01-01T00:00:00Z");
        let until = date("2024-01-20T00:00:00Z");

        let windows = fetch_windows(since, until);
        assert_eq!(
            windows,
            vec![
                (date("2024-01-01T00:00:00Z"), date("2024-01-08T00:00:00Z")),
                (date("2024-01-08T00:00:00Z"), date("2024-01-15T00:00:00Z")),
                (date("2024-01-15T00:00:00Z"), date("2024-01-20T00:00:00Z")),
            ]
        );
    }

    #[test]
    fn test_windows_are_contiguous_and_bounded() {
        let since = date("2023-10-12T06:30:00Z");
        let until = date("2024-01-10T00:00:00Z");

        let windows = fetch_windows(since, until);
        assert_eq!(windows.first().map(|w| w.0), Some(since));
        assert_eq!(windows.last().map(|w| w.1), Some(until));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (start, end) in windows {
            assert!(end - start <= Duration::days(WINDOW_DAYS));
        }
    }

    #[test]
    fn test_short_range_is_a_single_window() {
        let since = date("2024-01-08T00:00:00Z");
        let until = date("2024-01-10T00:00:00Z");
        assert_eq!(fetch_windows(since, until), vec![(since, until)]);
    }

    #[test]
    fn test_empty_range_yields_no_windows() {
        let at = date("2024-01-10T00:00:00Z");
        assert!(fetch_windows(at, at).is_empty());
        assert!(fetch_windows(date("2024-01-11T00:00:00Z"), at).is_empty());
    }

    #[test]
    fn test_first_window_starts_exactly_at_watermark() {
        // The boundary activity is re-listed on purpose; dedup absorbs it
        let watermark = date("2024-01-01T00:00:00Z");
        let windows = fetch_windows(watermark, date("2024-01-10T00:00:00Z"));
        assert_eq!(windows[0].0, watermark);
    }
}
