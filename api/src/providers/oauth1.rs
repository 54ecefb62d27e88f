//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! The signer is built once from the consumer credentials and handed to the
//! Twitter adapter. Timestamp and nonce come from the clock and the RNG unless
//! pinned with `with_fixed`, which is how signatures are made reproducible.

use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use sha1::Sha1;

use crate::config::ClientCredentials;
use crate::http::HttpRequest;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay as-is, everything else is escaped
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Token credentials (temporary or access) that co-sign a request
#[derive(Debug, Clone, Copy)]
pub struct TokenPair<'a> {
    pub token: &'a str,
    pub secret: &'a str,
}

#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
    fixed: Option<(i64, String)>,
}

impl OAuth1Signer {
    pub fn new(consumer: &ClientCredentials) -> Self {
        Self {
            consumer_key: consumer.id.clone(),
            consumer_secret: consumer.secret.clone(),
            fixed: None,
        }
    }

    /// Pin timestamp and nonce
    pub fn with_fixed(mut self, timestamp: i64, nonce: impl Into<String>) -> Self {
        self.fixed = Some((timestamp, nonce.into()));
        self
    }

    fn timestamp_and_nonce(&self) -> (String, String) {
        match &self.fixed {
            Some((ts, nonce)) => (ts.to_string(), nonce.clone()),
            None => {
                let nonce: String = rand::rng()
                    .sample_iter(rand::distr::Alphanumeric)
                    .take(32)
                    .map(char::from)
                    .collect();
                (chrono::Utc::now().timestamp().to_string(), nonce)
            }
        }
    }

    /// Attach an `Authorization: OAuth ...` header covering the request's query and form params.
    ///
    /// `extra` carries protocol parameters that belong in the header rather than
    /// the body, e.g. `oauth_callback` on the request-token call.
    pub fn sign(
        &self,
        request: HttpRequest,
        token: Option<TokenPair<'_>>,
        extra: &[(&str, &str)],
    ) -> HttpRequest {
        let header = self.authorization_header(
            request.method.as_str(),
            &request.url,
            &request.signed_params(),
            token,
            extra,
        );
        request.header("Authorization", header)
    }

    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        token: Option<TokenPair<'_>>,
        extra: &[(&str, &str)],
    ) -> String {
        let (timestamp, nonce) = self.timestamp_and_nonce();

        let mut oauth: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(pair) = token {
            oauth.push(("oauth_token".to_string(), pair.token.to_string()));
        }
        for (k, v) in extra {
            oauth.push((k.to_string(), v.to_string()));
        }

        let mut all: Vec<(String, String)> = oauth.clone();
        all.extend(params.iter().cloned());

        let signature = self.signature(method, url, &all, token.map(|t| t.secret));
        oauth.push(("oauth_signature".to_string(), signature));
        oauth.sort();

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    /// Signature over every oauth and request parameter
    pub fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        token_secret: Option<&str>,
    ) -> String {
        let mut encoded: Vec<(String, String)> =
            params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
        encoded.sort();
        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            encode(url),
            encode(&param_string)
        );
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(token_secret.unwrap_or(""))
        );

        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
        mac.update(base.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// Parse an `application/x-www-form-urlencoded` body (OAuth1 token endpoints answer this way)
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn form_value<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs_signer() -> OAuth1Signer {
        OAuth1Signer::new(&ClientCredentials {
            id: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
        })
        .with_fixed(1318622958, "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg")
    }

    fn docs_params() -> Vec<(String, String)> {
        vec![
            ("include_entities".to_string(), "true".to_string()),
            (
                "status".to_string(),
                "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
            ),
        ]
    }

    const DOCS_TOKEN: TokenPair<'static> = TokenPair {
        token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
        secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
    };

    #[test]
    fn matches_published_signature() {
        let header = docs_signer().authorization_header(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &docs_params(),
            Some(DOCS_TOKEN),
            &[],
        );
        assert!(
            header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""),
            "{header}"
        );
    }

    #[test]
    fn header_lists_oauth_params_only() {
        let header = docs_signer().authorization_header(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &docs_params(),
            Some(DOCS_TOKEN),
            &[],
        );
        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_token=\"370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb\""));
        assert!(!header.contains("include_entities"));
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("https://x.com/cb?a=1"), "https%3A%2F%2Fx.com%2Fcb%3Fa%3D1");
    }

    #[test]
    fn extra_protocol_params_are_signed_into_header() {
        let header = docs_signer().authorization_header(
            "POST",
            "https://api.twitter.com/oauth/request_token",
            &[],
            None,
            &[("oauth_callback", "https://api.postonce.app/integrations/twitter/callback")],
        );
        assert!(header.contains(
            "oauth_callback=\"https%3A%2F%2Fapi.postonce.app%2Fintegrations%2Ftwitter%2Fcallback\""
        ));
        assert!(!header.contains("oauth_token="));
    }

    #[test]
    fn parses_token_response_form() {
        let fields = parse_form("oauth_token=abc&oauth_token_secret=def&screen_name=postonce");
        assert_eq!(form_value(&fields, "oauth_token_secret"), Some("def"));
        assert_eq!(form_value(&fields, "screen_name"), Some("postonce"));
        assert_eq!(form_value(&fields, "user_id"), None);
    }
}
