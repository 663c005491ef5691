/// Default base URL for API requests.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Join a base URL and endpoint path, appending the raw `query` when present.
///
/// An empty base keeps [`DEFAULT_BASE_URL`]; a leading `?` on the query is
/// tolerated.
pub fn endpoint_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let base = if base_url.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base_url.trim()
    };

    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );

    if let Some(query) = query
        .map(|query| query.trim().trim_start_matches('?'))
        .filter(|query| !query.is_empty())
    {
        url.push('?');
        url.push_str(query);
    }

    url
}
