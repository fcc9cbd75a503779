//! Request classification: HTML navigations and image assets.

use crate::types::InterceptedRequest;

/// Image suffixes routed through the adaptive image path.
pub const IMAGE_SUFFIXES: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// What kind of request this is, for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Image,
    Navigation,
    Asset,
}

/// A GET whose `accept` header asks for an HTML document.
pub fn is_navigation(request: &InterceptedRequest) -> bool {
    request.is_get()
        && request
            .header("accept")
            .is_some_and(|accept| accept.contains("text/html"))
}

/// Whether the URL path ends with one of [`IMAGE_SUFFIXES`].
///
/// Only the path is considered, so `photo.png?w=200` is an image and
/// `/page?file=photo.png` is not. Matching ignores ASCII case.
pub fn is_image_url(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        // Relative or malformed: strip query and fragment by hand.
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
    };
    IMAGE_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Only GET and HEAD image requests take the adaptive path; other methods
/// keep their body and go to the origin untouched.
pub fn classify(request: &InterceptedRequest) -> RequestKind {
    let readable = request.is_get() || request.method.eq_ignore_ascii_case("HEAD");
    if readable && is_image_url(&request.url) {
        RequestKind::Image
    } else if is_navigation(request) {
        RequestKind::Navigation
    } else {
        RequestKind::Asset
    }
}
