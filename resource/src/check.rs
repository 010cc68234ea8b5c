//! `check`: discover versions newer than the requested one.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::types::Version;
use crate::io::remote::{PAGE_SIZE, PageRequest, RemoteService};

/// Discover versions with the default page size.
pub fn discover_versions<S: RemoteService>(
    service: &S,
    workspace_id: &str,
    target: &str,
) -> Result<Vec<Version>> {
    discover_versions_paged(service, workspace_id, target, PAGE_SIZE)
}

/// Scan the workspace's runs (newest first) for `target`.
///
/// Returns the refs observed in listing order, ending with `target` when it is
/// found. An empty target yields only the most recent run. When the listing is
/// exhausted without a match, only the most recent run is returned: its order
/// relative to an unknown version cannot be determined.
#[instrument(skip_all, fields(workspace_id = %workspace_id, target = %target, page_size = page_size))]
pub fn discover_versions_paged<S: RemoteService>(
    service: &S,
    workspace_id: &str,
    target: &str,
    page_size: usize,
) -> Result<Vec<Version>> {
    let page_size = page_size.max(1);
    let mut page = PageRequest::first(page_size);
    let mut observed: Vec<Version> = Vec::new();

    loop {
        let runs = service
            .list_runs(workspace_id, page)
            .context("listing runs")?;
        debug!(page = page.number, runs = runs.len(), "listed runs");

        if target.is_empty() {
            return Ok(runs
                .into_iter()
                .next()
                .map(|run| vec![Version::new(run.id)])
                .unwrap_or_default());
        }

        let exhausted = runs.len() < page_size;
        for run in runs {
            let found = run.id == target;
            observed.push(Version::new(run.id));
            if found {
                info!(versions = observed.len(), "requested version found");
                return Ok(observed);
            }
        }
        if exhausted {
            break;
        }
        page = page.next();
    }

    info!("requested version not found, returning current version");
    observed.truncate(1);
    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, Op, ScriptedService};

    fn refs(versions: &[Version]) -> Vec<&str> {
        versions.iter().map(|v| v.reference.as_str()).collect()
    }

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| i.to_string()).collect()
    }

    fn service_with(count: usize) -> ScriptedService {
        let ids = ids(count);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        ScriptedService::new().with_runs(&refs)
    }

    #[test]
    fn empty_target_returns_latest_from_first_page_only() {
        let service = service_with(250);
        let versions = discover_versions_paged(&service, "ws-foo", "", 100).expect("check");
        assert_eq!(refs(&versions), vec!["0"]);
        assert_eq!(service.calls_of(Op::ListRuns).len(), 1);
    }

    #[test]
    fn found_target_ends_the_list() {
        for count in [1, 5, 7, 23] {
            for page_size in [1, 2, 5, 100] {
                let service = service_with(count);
                for target in 0..count {
                    let target = target.to_string();
                    let versions = discover_versions_paged(&service, "ws-foo", &target, page_size)
                        .expect("check");
                    assert_eq!(
                        versions.last().map(|v| v.reference.as_str()),
                        Some(target.as_str()),
                        "count={count} page_size={page_size}"
                    );
                    assert_eq!(versions.len(), target.parse::<usize>().expect("int") + 1);
                }
            }
        }
    }

    #[test]
    fn missing_target_falls_back_to_latest() {
        for page_size in [2, 3, 100] {
            let service = service_with(6);
            let versions =
                discover_versions_paged(&service, "ws-foo", "9", page_size).expect("check");
            assert_eq!(refs(&versions), vec!["0"], "page_size={page_size}");
        }
    }

    #[test]
    fn scans_following_pages() {
        let service = service_with(10);
        let versions = discover_versions_paged(&service, "ws-foo", "8", 5).expect("check");
        assert_eq!(versions.len(), 9);
        let pages: Vec<usize> = service
            .calls_of(Op::ListRuns)
            .into_iter()
            .filter_map(|call| match call {
                Call::ListRuns { page, .. } => Some(page.number),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn empty_workspace_has_no_versions() {
        let service = ScriptedService::new();
        assert!(discover_versions(&service, "ws-foo", "").expect("check").is_empty());
        assert!(discover_versions(&service, "ws-foo", "run-1").expect("check").is_empty());
    }

    #[test]
    fn listing_error_aborts() {
        let service = service_with(5).failing(Op::ListRuns, "NO");
        let err = discover_versions(&service, "ws-foo", "2").unwrap_err();
        assert_eq!(format!("{err:#}"), "listing runs: NO");
    }
}
