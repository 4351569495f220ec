use axum::{
    body::Body as AxumBody,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};

/// Negotiated UI language of a request, inserted as an extension by `i18n_middleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Maps the first `Accept-Language` entry onto a supported locale.
pub fn negotiate_locale(headers: &HeaderMap) -> Locale {
    let preferred = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.split(';').next())
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    let primary = preferred.split(['-', '_']).next().unwrap_or_default();
    match primary {
        "nb" | "nn" | "no" => Locale("nb".to_string()),
        _ => Locale("en".to_string()),
    }
}

pub async fn i18n_middleware(mut req: Request<AxumBody>, next: Next) -> Response {
    let locale = negotiate_locale(req.headers());
    req.extensions_mut().insert(locale);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_language(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn norwegian_variants_map_to_bokmal() {
        assert_eq!(negotiate_locale(&with_language("nb-NO,nb;q=0.9")).as_str(), "nb");
        assert_eq!(negotiate_locale(&with_language("nn")).as_str(), "nb");
        assert_eq!(negotiate_locale(&with_language("no;q=0.8")).as_str(), "nb");
    }

    #[test]
    fn everything_else_is_english() {
        assert_eq!(negotiate_locale(&with_language("de-DE,de")).as_str(), "en");
        assert_eq!(negotiate_locale(&HeaderMap::new()).as_str(), "en");
    }
}
