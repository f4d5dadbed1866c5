//! Request classification helpers for page-oriented middleware.

use super::EdgeRequest;

/// Cookie set while a preview session is active.
pub const PREVIEW_COOKIE: &str = "__next_preview_data";

/// Header present on client-side data fetches.
pub const DATA_REQUEST_HEADER: &str = "x-nextjs-data";

/// True when the path looks like a page: not under `/_next/` or `/api/`, and
/// without a file extension.
pub fn is_page_path_request(req: &EdgeRequest) -> bool {
    let path = req.path();
    let internal = path.starts_with("/_next/") || path.starts_with("/api/");
    !internal && !path.contains('.')
}

/// True when the preview cookie is present, whatever its value.
pub fn is_preview_mode_request(req: &EdgeRequest) -> bool {
    req.cookie(PREVIEW_COOKIE).is_some()
}

pub fn is_data_request(req: &EdgeRequest) -> bool {
    req.header(DATA_REQUEST_HEADER).is_some_and(|v| !v.is_empty())
}

/// A page navigation outside preview mode that is not a data fetch.
pub fn is_page_request(req: &EdgeRequest) -> bool {
    is_page_path_request(req) && !is_preview_mode_request(req) && !is_data_request(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn request(uri: &str, headers: &[(&str, &str)]) -> EdgeRequest {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        EdgeRequest::from(&builder.body(()).unwrap())
    }

    #[test]
    fn test_page_paths() {
        assert!(is_page_path_request(&request("/", &[])));
        assert!(is_page_path_request(&request("/blog/hello", &[])));
        assert!(is_page_path_request(&request("/apis", &[])));
        assert!(!is_page_path_request(&request("/api/users", &[])));
        assert!(!is_page_path_request(&request("/_next/static/chunk", &[])));
        assert!(!is_page_path_request(&request("/favicon.ico", &[])));
    }

    #[test]
    fn test_preview_and_data_requests() {
        let preview = request("/", &[("cookie", "__next_preview_data=abc")]);
        let data = request("/", &[("x-nextjs-data", "1")]);

        assert!(is_preview_mode_request(&preview));
        assert!(!is_preview_mode_request(&data));
        assert!(is_data_request(&data));
        assert!(!is_data_request(&preview));
    }

    #[test]
    fn test_page_request_combines_checks() {
        assert!(is_page_request(&request("/docs", &[])));
        assert!(!is_page_request(&request("/docs", &[("x-nextjs-data", "1")])));
        assert!(!is_page_request(&request("/docs", &[("cookie", "__next_preview_data=1")])));
        assert!(!is_page_request(&request("/logo.svg", &[])));
    }

    #[test]
    fn test_empty_preview_cookie_still_counts() {
        let preview = request("/docs", &[("cookie", "__next_preview_data=")]);
        assert!(is_preview_mode_request(&preview));
        assert!(!is_page_request(&preview));
    }
}
