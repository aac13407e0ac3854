//! Page-style route parsing for the bootstrap layer.
//!
//! The hosting pages selected their poll loop by page name and passed ids
//! through the query string (`logs.html?app_id=a&device_id=d`). The `open`
//! command accepts the same routes and dispatches to the matching loop.

use std::collections::HashMap;

use thiserror::Error;

/// Errors produced while resolving a route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("unknown page '{0}'")]
    UnknownPage(String),
    #[error("route '{page}' is missing parameter '{param}'")]
    MissingParam { page: String, param: String },
}

/// The poll loop a route resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    AppList,
    DeviceList { app_id: String },
    LogTail { app_id: String, device_id: String },
    Game,
}

/// Simple percent-decoding for URL query parameters.
pub fn url_decode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => result.push(' '),
            '%' => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    result.push(byte as char);
                }
            }
            _ => result.push(c),
        }
    }
    result
}

/// Parse query string into key-value pairs.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let val = parts.next().unwrap_or("");
            Some((key.to_string(), url_decode(val)))
        })
        .collect()
}

/// Resolve a page-style URL to its poll loop.
///
/// Leading directories are ignored; only the page name and query matter.
/// An empty page (or a bare `/`) means the index.
pub fn parse_route(url: &str) -> Result<Target, RouteError> {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };
    let page = path.rsplit('/').next().unwrap_or(path);
    let params = parse_query(query);

    let require = |param: &str| -> Result<String, RouteError> {
        params
            .get(param)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| RouteError::MissingParam {
                page: page.to_string(),
                param: param.to_string(),
            })
    };

    match page {
        "" | "index.html" => Ok(Target::AppList),
        "app.html" => Ok(Target::DeviceList {
            app_id: require("app_id")?,
        }),
        "logs.html" => Ok(Target::LogTail {
            app_id: require("app_id")?,
            device_id: require("device_id")?,
        }),
        "game.html" => Ok(Target::Game),
        other => Err(RouteError::UnknownPage(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // -- query decoding -----------------------------------------------------

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a%26b"), "a&b");
        assert_eq!(url_decode("plain"), "plain");
    }

    #[test]
    fn test_parse_query() {
        let params = parse_query("app_id=a1&device_id=d+1");
        assert_eq!(params.get("app_id").map(|s| s.as_str()), Some("a1"));
        assert_eq!(params.get("device_id").map(|s| s.as_str()), Some("d 1"));
    }

    #[test]
    fn test_parse_query_empty() {
        let params = parse_query("");
        assert!(params.is_empty() || params.get("").map_or(true, |v| v.is_empty()));
    }

    // -- route resolution ---------------------------------------------------

    #[rstest]
    #[case("index.html", Target::AppList)]
    #[case("", Target::AppList)]
    #[case("game.html", Target::Game)]
    #[case("/demos/game.html", Target::Game)]
    fn parse_route_parameterless_pages(#[case] url: &str, #[case] expected: Target) {
        assert_eq!(parse_route(url).expect("route"), expected);
    }

    #[test]
    fn parse_route_app_page_extracts_app_id() {
        assert_eq!(
            parse_route("app.html?app_id=a1").expect("route"),
            Target::DeviceList { app_id: "a1".to_string() }
        );
    }

    #[test]
    fn parse_route_logs_page_extracts_both_ids() {
        assert_eq!(
            parse_route("logs.html?app_id=a1&device_id=d1").expect("route"),
            Target::LogTail {
                app_id: "a1".to_string(),
                device_id: "d1".to_string()
            }
        );
    }

    #[test]
    fn parse_route_ignores_leading_directories() {
        assert_eq!(
            parse_route("/slash/static/app.html?app_id=a1").expect("route"),
            Target::DeviceList { app_id: "a1".to_string() }
        );
    }

    #[test]
    fn parse_route_decodes_parameters() {
        assert_eq!(
            parse_route("app.html?app_id=my%20app").expect("route"),
            Target::DeviceList { app_id: "my app".to_string() }
        );
    }

    #[test]
    fn parse_route_missing_app_id_errors() {
        let err = parse_route("app.html").unwrap_err();
        match err {
            RouteError::MissingParam { page, param } => {
                assert_eq!(page, "app.html");
                assert_eq!(param, "app_id");
            }
            other => panic!("expected MissingParam, got {other:?}"),
        }
    }

    #[test]
    fn parse_route_missing_device_id_errors() {
        let err = parse_route("logs.html?app_id=a1").unwrap_err();
        assert!(matches!(err, RouteError::MissingParam { .. }));
    }

    #[test]
    fn parse_route_empty_param_counts_as_missing() {
        assert!(parse_route("app.html?app_id=").is_err());
    }

    #[test]
    fn parse_route_unknown_page_errors() {
        let err = parse_route("admin.html").unwrap_err();
        assert!(matches!(err, RouteError::UnknownPage(p) if p == "admin.html"));
    }
}
