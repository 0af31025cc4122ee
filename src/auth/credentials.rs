//! Credential extraction.
//!
//! Turns the `Cookie` and `Authorization` headers into an ordered list of
//! candidate credentials. Cookie-derived credentials always come first; the
//! order is the channel priority the resolver honours.

use axum::http::{header, HeaderMap};

use crate::auth::identity::SessionCookies;

/// Raw, unverified evidence of identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Cookie(SessionCookies),
    BearerToken(String),
}

/// Candidate credentials in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials(Vec<Credential>);

impl Credentials {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self(credentials)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.0.iter()
    }

    pub fn cookie(&self) -> Option<&SessionCookies> {
        self.0.iter().find_map(|c| match c {
            Credential::Cookie(session) => Some(session),
            _ => None,
        })
    }

    pub fn bearer(&self) -> Option<&str> {
        self.0.iter().find_map(|c| match c {
            Credential::BearerToken(token) => Some(token.as_str()),
            _ => None,
        })
    }
}

/// Reads credentials using the configured session cookie names.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    access_cookie: String,
    refresh_cookie: String,
}

impl CredentialExtractor {
    pub fn new(access_cookie: impl Into<String>, refresh_cookie: impl Into<String>) -> Self {
        Self {
            access_cookie: access_cookie.into(),
            refresh_cookie: refresh_cookie.into(),
        }
    }

    /// Extract candidate credentials. Absence is not an error.
    pub fn extract(&self, headers: &HeaderMap) -> Credentials {
        let mut credentials = Vec::with_capacity(2);

        let session = SessionCookies {
            access_token: cookie_value(headers, &self.access_cookie),
            refresh_token: cookie_value(headers, &self.refresh_cookie),
        };
        if !session.is_empty() {
            credentials.push(Credential::Cookie(session));
        }

        if let Some(token) = bearer_token(headers) {
            credentials.push(Credential::BearerToken(token));
        }

        Credentials(credentials)
    }
}

/// Token from an `Authorization: Bearer <token>` header, verbatim.
/// A token containing whitespace is malformed.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
        .map(str::to_string)
}

/// Value of a named cookie across all `Cookie` headers. Empty values count as absent.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn extractor() -> CredentialExtractor {
        CredentialExtractor::new("sb-access-token", "sb-refresh-token")
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_no_credentials() {
        assert!(extractor().extract(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_cookie_comes_before_bearer() {
        let creds = extractor().extract(&headers(&[
            (header::AUTHORIZATION, "Bearer abc"),
            (header::COOKIE, "theme=dark; sb-access-token=tok1; sb-refresh-token=ref1"),
        ]));

        let items: Vec<_> = creds.iter().cloned().collect();
        assert_eq!(
            items,
            vec![
                Credential::Cookie(SessionCookies {
                    access_token: Some("tok1".into()),
                    refresh_token: Some("ref1".into()),
                }),
                Credential::BearerToken("abc".into()),
            ]
        );
    }

    #[test]
    fn test_refresh_cookie_alone_is_a_credential() {
        let creds = extractor().extract(&headers(&[(header::COOKIE, "sb-refresh-token=ref1")]));
        let session = creds.cookie().unwrap();
        assert_eq!(session.access_token, None);
        assert_eq!(session.refresh_token.as_deref(), Some("ref1"));
    }

    #[test]
    fn test_malformed_authorization_yields_nothing() {
        for value in [
            "Basic dXNlcjpwdw==",
            "bearer abc",
            "Bearerabc",
            "Bearer ",
            "Bearer  abc",
            "Bearer\tabc",
            "Bearer abc def",
            "abc",
        ] {
            let creds = extractor().extract(&headers(&[(header::AUTHORIZATION, value)]));
            assert_eq!(creds.bearer(), None, "header {value:?}");
        }
    }

    #[test]
    fn test_cookie_lookup_spans_multiple_headers() {
        let map = headers(&[
            (header::COOKIE, "a=1"),
            (header::COOKIE, "sb-access-token=tok2"),
        ]);
        assert_eq!(cookie_value(&map, "sb-access-token").as_deref(), Some("tok2"));
        assert_eq!(cookie_value(&map, "sb-access"), None);
    }

    #[test]
    fn test_unrelated_cookies_ignored() {
        let creds = extractor().extract(&headers(&[(header::COOKIE, "session=xyz; sb-access-token=")]));
        assert!(creds.is_empty());
    }
}
