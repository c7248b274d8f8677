use axum::http::{HeaderMap, HeaderName};

/// Header names carrying the signature and the event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
    pub signature: HeaderName,
    pub event: HeaderName,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            signature: HeaderName::from_static("x-hub-signature"),
            event: HeaderName::from_static("x-github-event"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedHeaders {
    pub signature: Option<String>,
    pub event_type: Option<String>,
}

/// Pulls the webhook headers out of a request. Values that are empty or not
/// valid visible ASCII count as absent, so a garbled signature fails closed.
pub fn extract(headers: &HeaderMap, names: &HeaderNames) -> ExtractedHeaders {
    ExtractedHeaders {
        signature: header_string(headers, &names.signature),
        event_type: header_string(headers, &names.event),
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Hub-Signature", HeaderValue::from_static("sha1=abc"));
        headers.insert("X-GitHub-Event", HeaderValue::from_static(" push "));

        let extracted = extract(&headers, &HeaderNames::default());
        assert_eq!(extracted.signature.as_deref(), Some("sha1=abc"));
        assert_eq!(extracted.event_type.as_deref(), Some("push"));
    }

    #[test]
    fn missing_headers_are_none() {
        let extracted = extract(&HeaderMap::new(), &HeaderNames::default());
        assert_eq!(extracted, ExtractedHeaders::default());
    }

    #[test]
    fn blank_and_non_text_values_are_treated_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Hub-Signature", HeaderValue::from_static("   "));
        headers.insert(
            "X-GitHub-Event",
            HeaderValue::from_bytes(&[0xff, 0xfe]).expect("opaque header bytes"),
        );

        let extracted = extract(&headers, &HeaderNames::default());
        assert_eq!(extracted.signature, None);
        assert_eq!(extracted.event_type, None);
    }

    #[test]
    fn honours_configured_header_names() {
        let names = HeaderNames {
            signature: HeaderName::from_static("x-hub-signature-256"),
            event: HeaderName::from_static("x-gitea-event"),
        };
        let mut headers = HeaderMap::new();
        headers.insert("X-Hub-Signature", HeaderValue::from_static("sha1=abc"));
        headers.insert("X-Hub-Signature-256", HeaderValue::from_static("sha256=def"));
        headers.insert("X-Gitea-Event", HeaderValue::from_static("push"));

        let extracted = extract(&headers, &names);
        assert_eq!(extracted.signature.as_deref(), Some("sha256=def"));
        assert_eq!(extracted.event_type.as_deref(), Some("push"));
    }
}
