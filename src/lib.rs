pub mod config;
pub mod driver;
pub mod error;
pub mod handler;
pub mod irc;
pub mod session;
pub mod youtube;

#[cfg(test)]
mod testing;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Host of the short-link form, `https://youtu.be/<id>`
pub const SHORT_LINK_HOST: &str = "youtu.be";

/// Substring shared by every supported host (youtube.com, youtu.be, ...)
const SUPPORTED_HOST_MARKER: &str = "youtu";

// The `$-_` run is a character range, which is what lets `/ : ? = %` through.
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+")
        .expect("url pattern is valid")
});

/// Find the leftmost hyperlink in a line of chat text.
///
/// The match is returned verbatim; no decoding or normalization is applied.
pub fn extract_first_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

/// Whether the URL points at a YouTube host (canonical or short-link domain)
pub fn is_supported_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| host.contains(SUPPORTED_HOST_MARKER))
}

/// Extract the video ID from a YouTube URL.
///
/// Short links (`youtu.be`) take the ID from the first path segment; every
/// other host takes it from the `v` query parameter. Exactly one of the two
/// rules runs, chosen by the host.
pub fn resolve_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    if host.eq_ignore_ascii_case(SHORT_LINK_HOST) {
        return parsed
            .path()
            .split('/')
            .nth(1)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
    }

    parsed
        .query_pairs()
        .filter(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .find(|value| !value.is_empty())
}
