//! `multi_tab_compare` template (spec §4.3): extract title, element
//! count, and top sections from up to 10 URLs, then diff every entry
//! against the first (the baseline) with a configurable numeric
//! tolerance on the element-count comparison.

use agentbrowse_browser_session::{driver, SessionManager};
use agentbrowse_types::SessionId;
use serde::Serialize;

pub const MAX_URLS: usize = 10;
const DEFAULT_TOLERANCE: u32 = 2;
const TOP_SECTIONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub element_count: usize,
    pub top_sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDiff {
    pub url: String,
    pub title_matches_baseline: bool,
    pub element_count_diff: i64,
    pub within_tolerance: bool,
    pub missing_sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareResult {
    pub baseline: PageSnapshot,
    pub diffs: Vec<FieldDiff>,
}

/// Errors if more than [`MAX_URLS`] URLs or fewer than two are given —
/// a comparison needs a baseline and at least one other page.
pub async fn run_multi_tab_compare(
    sessions: &SessionManager,
    session_id: SessionId,
    urls: &[String],
    tolerance: Option<u32>,
) -> Result<CompareResult, String> {
    if urls.len() < 2 {
        return Err("multi_tab_compare needs at least two URLs".to_string());
    }
    if urls.len() > MAX_URLS {
        return Err(format!("multi_tab_compare accepts at most {MAX_URLS} URLs"));
    }

    let tolerance = tolerance.unwrap_or(DEFAULT_TOLERANCE) as i64;

    let mut snapshots = Vec::with_capacity(urls.len());
    for url in urls {
        snapshots.push(snapshot_one(sessions, session_id, url).await?);
    }

    let baseline = snapshots.remove(0);
    let diffs = snapshots
        .into_iter()
        .map(|snap| diff_against(&baseline, &snap, tolerance))
        .collect();

    Ok(CompareResult { baseline, diffs })
}

async fn snapshot_one(sessions: &SessionManager, session_id: SessionId, url: &str) -> Result<PageSnapshot, String> {
    let tab_id = sessions
        .create_tab(session_id, url)
        .await
        .map_err(|e| e.to_string())?;

    let result = sessions
        .with_tab(session_id, tab_id, |page| {
            let url = url.to_string();
            async move {
                driver::navigate(&page, &url).await?;
                let title = driver::title(&page).await.unwrap_or_default();
                let text = driver::page_text(&page).await.unwrap_or_default();
                let element_count = driver::execute_javascript(
                    &page,
                    "document.querySelectorAll('a, button, input, select, textarea, [role=button], [onclick]').length",
                )
                .await
                .ok()
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
                let top_sections = text
                    .split("\n\n")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .take(TOP_SECTIONS)
                    .map(str::to_string)
                    .collect();
                Ok((title, element_count, top_sections))
            }
        })
        .await
        .map_err(|e| e.to_string());

    let _ = sessions.close_tab(session_id, tab_id).await;

    let (title, element_count, top_sections) = result?;
    Ok(PageSnapshot {
        url: url.to_string(),
        title,
        element_count,
        top_sections,
    })
}

fn diff_against(baseline: &PageSnapshot, other: &PageSnapshot, tolerance: i64) -> FieldDiff {
    let element_count_diff = other.element_count as i64 - baseline.element_count as i64;
    let missing_sections = baseline
        .top_sections
        .iter()
        .filter(|s| !other.top_sections.contains(s))
        .cloned()
        .collect();

    FieldDiff {
        url: other.url.clone(),
        title_matches_baseline: other.title == baseline.title,
        element_count_diff,
        within_tolerance: element_count_diff.abs() <= tolerance,
        missing_sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, title: &str, element_count: usize, sections: Vec<&str>) -> PageSnapshot {
        PageSnapshot {
            url: url.to_string(),
            title: title.to_string(),
            element_count,
            top_sections: sections.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn matching_titles_and_close_element_counts_are_within_tolerance() {
        let baseline = page("https://a.test", "Widgets", 20, vec!["intro", "details"]);
        let other = page("https://b.test", "Widgets", 21, vec!["intro", "details"]);
        let diff = diff_against(&baseline, &other, 2);
        assert!(diff.title_matches_baseline);
        assert!(diff.within_tolerance);
        assert!(diff.missing_sections.is_empty());
    }

    #[test]
    fn element_count_outside_tolerance_is_flagged() {
        let baseline = page("https://a.test", "Widgets", 20, vec!["intro"]);
        let other = page("https://b.test", "Widgets", 30, vec!["intro"]);
        let diff = diff_against(&baseline, &other, 2);
        assert!(!diff.within_tolerance);
        assert_eq!(diff.element_count_diff, 10);
    }

    #[test]
    fn sections_missing_from_the_other_page_are_reported() {
        let baseline = page("https://a.test", "Widgets", 20, vec!["intro", "pricing"]);
        let other = page("https://b.test", "Widgets", 20, vec!["intro"]);
        let diff = diff_against(&baseline, &other, 2);
        assert_eq!(diff.missing_sections, vec!["pricing".to_string()]);
    }
}
