//! AWS Signature Version 4 request signing.
//!
//! Used only to negotiate an upload slot with the image store. The signer is
//! stateless: callers supply every input, including the timestamp.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Temporary credentials issued by the upload-token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Region and service a signature is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope<'a> {
    pub region: &'a str,
    pub service: &'a str,
}

/// Request parts covered by the signature.
///
/// Every header listed is signed. `host`, when set, is signed as the `host`
/// header.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: Option<&'a str>,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
}

/// `x-amz-date` value for `now`.
#[must_use]
pub fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Hex signature for `request` at `amz_date` (`YYYYMMDDTHHMMSSZ`).
#[must_use]
pub fn sign(
    scope: Scope<'_>,
    credentials: &SigningCredentials,
    request: &SignableRequest<'_>,
    amz_date: &str,
) -> String {
    let date_stamp = date_stamp(amz_date);
    let canonical = canonical_request(request);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{}\n{}",
        credential_scope(scope, date_stamp),
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );
    let key = signing_key(&credentials.secret_access_key, date_stamp, scope);
    hex::encode(hmac(&key, string_to_sign.as_bytes()))
}

/// Full `Authorization` header value.
#[must_use]
pub fn authorization_header(
    scope: Scope<'_>,
    credentials: &SigningCredentials,
    request: &SignableRequest<'_>,
    amz_date: &str,
) -> String {
    let signature = sign(scope, credentials, request, amz_date);
    format!(
        "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={signature}",
        credentials.access_key_id,
        credential_scope(scope, date_stamp(amz_date)),
        signed_headers(request),
    )
}

fn date_stamp(amz_date: &str) -> &str {
    amz_date.get(..8).unwrap_or(amz_date)
}

fn credential_scope(scope: Scope<'_>, date_stamp: &str) -> String {
    format!("{date_stamp}/{}/{}/aws4_request", scope.region, scope.service)
}

fn canonical_request(request: &SignableRequest<'_>) -> String {
    let mut query: Vec<(String, String)> = request
        .query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    query.sort();
    let query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_headers: String = sorted_headers(request)
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();

    let path = if request.path.is_empty() {
        "/".to_string()
    } else {
        uri_encode(request.path, false)
    };

    format!(
        "{}\n{path}\n{query}\n{canonical_headers}\n{}\n{}",
        request.method.to_uppercase(),
        signed_headers(request),
        hex::encode(Sha256::digest(request.payload)),
    )
}

fn sorted_headers(request: &SignableRequest<'_>) -> Vec<(String, String)> {
    let host = request.host.map(|h| ("host", h));
    let listed = request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));
    let mut out: Vec<(String, String)> = host
        .into_iter()
        .chain(listed)
        .map(|(k, v)| {
            let value = v.split_whitespace().collect::<Vec<_>>().join(" ");
            (k.to_lowercase(), value)
        })
        .collect();
    out.sort();
    out
}

fn signed_headers(request: &SignableRequest<'_>) -> String {
    sorted_headers(request)
        .into_iter()
        .map(|(k, _)| k)
        .collect::<Vec<_>>()
        .join(";")
}

fn signing_key(secret: &str, date_stamp: &str, scope: Scope<'_>) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, scope.region.as_bytes());
    let k_service = hmac(&k_region, scope.service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// RFC 3986 encoding; `/` is kept when encoding a path.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> SigningCredentials {
        SigningCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            session_token: String::new(),
        }
    }

    #[test]
    fn signing_key_matches_published_example() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            Scope {
                region: "us-east-1",
                service: "iam",
            },
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature() {
        let headers = vec![("X-Amz-Date".to_string(), "20150830T123600Z".to_string())];
        let request = SignableRequest {
            method: "GET",
            host: Some("example.amazonaws.com"),
            path: "/",
            query: &[],
            headers: &headers,
            payload: b"",
        };
        let scope = Scope {
            region: "us-east-1",
            service: "service",
        };
        assert_eq!(
            sign(scope, &example_credentials(), &request, "20150830T123600Z"),
            "5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(
            authorization_header(scope, &example_credentials(), &request, "20150830T123600Z"),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let query = vec![
            ("Version".to_string(), "2018-08-01".to_string()),
            ("Action".to_string(), "Apply Image".to_string()),
        ];
        let request = SignableRequest {
            method: "get",
            host: None,
            path: "",
            query: &query,
            headers: &[],
            payload: b"",
        };
        let canonical = canonical_request(&request);
        let mut lines = canonical.lines();
        assert_eq!(lines.next(), Some("GET"));
        assert_eq!(lines.next(), Some("/"));
        assert_eq!(lines.next(), Some("Action=Apply%20Image&Version=2018-08-01"));
    }

    #[test]
    fn host_is_signed_only_when_given() {
        let headers = vec![("x-amz-date".to_string(), "20150830T123600Z".to_string())];
        let scope = Scope {
            region: "cn-north-1",
            service: "imagex",
        };
        let without_host = SignableRequest {
            method: "GET",
            host: None,
            path: "/",
            query: &[],
            headers: &headers,
            payload: b"",
        };
        let with_host = SignableRequest {
            host: Some("imagex.example.com"),
            ..without_host.clone()
        };

        let bare = authorization_header(scope, &example_credentials(), &without_host, "20150830T123600Z");
        let hosted = authorization_header(scope, &example_credentials(), &with_host, "20150830T123600Z");
        assert!(bare.contains("SignedHeaders=x-amz-date,"), "{bare}");
        assert!(hosted.contains("SignedHeaders=host;x-amz-date,"), "{hosted}");
        assert!(canonical_request(&with_host).contains("\nhost:imagex.example.com\n"));
        assert_ne!(
            sign(scope, &example_credentials(), &without_host, "20150830T123600Z"),
            sign(scope, &example_credentials(), &with_host, "20150830T123600Z")
        );
    }

    #[test]
    fn amz_date_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(amz_date(now), "20250309T070501Z");
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let shown = format!("{:?}", example_credentials());
        assert!(!shown.contains("EXAMPLEKEY"));
    }
}
