use percent_encoding::percent_decode_str;

/// Extract a url embedded in another url, such as the target of a
/// tracking redirector (`...&url=https%3A%2F%2Ftarget`).
///
/// Only the first `http` occurrence after the first character is
/// considered. When it directly follows `=` it ends at the next `&` or `;`.
/// The candidate is percent-decoded once and accepted only when it
/// continues with `://` after its `http`/`https` prefix.
pub fn parse_inline_url(url: &str) -> Option<String> {
    let from = url.chars().next()?.len_utf8();
    let start = from + url[from..].find("http")?;
    let mut candidate = &url[start..];
    if url[..start].ends_with('=') {
        if let Some(end) = candidate.find(|c: char| c == '&' || c == ';') {
            candidate = &candidate[..end];
        }
    }
    let decoded = percent_decode_str(candidate).decode_utf8_lossy().into_owned();
    is_http_url(&decoded).then_some(decoded)
}

fn is_http_url(value: &str) -> bool {
    value
        .strip_prefix("https")
        .or_else(|| value.strip_prefix("http"))
        .is_some_and(|rest| rest.starts_with("://"))
}
