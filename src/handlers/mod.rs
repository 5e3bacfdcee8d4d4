//! HTTP handlers for UI mode (view trees and redirects) and API mode (JSON envelopes).

pub mod api;
pub mod ui;

use crate::error::AppError;
use axum::http::{header::CONTENT_TYPE, HeaderMap};

/// Non-empty path segments below the mount point, each percent-decoded after
/// splitting so an encoded `/` stays inside its segment.
fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()))
        .collect()
}

/// Query pairs in request order; repeated keys are kept.
fn query_pairs(raw: Option<&str>) -> Result<Vec<(String, String)>, AppError> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(q) => serde_urlencoded::from_str(q).map_err(|e| AppError::InvalidQuery(e.to_string())),
    }
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_keep_repeats_and_decode() {
        let pairs = query_pairs(Some("status=draft&status=live&search=ru%20st")).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("status".to_string(), "draft".to_string()),
                ("status".to_string(), "live".to_string()),
                ("search".to_string(), "ru st".to_string()),
            ]
        );
        assert!(query_pairs(None).unwrap().is_empty());
    }

    #[test]
    fn segments_skip_empty_parts() {
        assert_eq!(segments("/Post//7/edit/"), ["Post", "7", "edit"]);
        assert!(segments("").is_empty());
    }

    #[test]
    fn segments_decode_after_splitting() {
        assert_eq!(segments("/Tag/caf%C3%A9%2Fbar/edit"), ["Tag", "café/bar", "edit"]);
    }
}
