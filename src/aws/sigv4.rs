//! AWS Signature Version 4 for single-chunk requests.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::macros::format_description;

use super::AwsCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Path as sent on the wire (segments already percent-encoded once).
    pub path: &'a str,
    /// Canonical query string, empty when there is none.
    pub query: &'a str,
    /// Extra headers to sign besides `host` and `x-amz-date`.
    pub headers: &'a [(&'a str, &'a str)],
    pub payload: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub authorization: String,
    pub amz_date: String,
    pub signature: String,
}

/// Percent-encode one path segment (RFC 3986 unreserved chars pass through).
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

pub fn sign(
    req: &SignableRequest<'_>,
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    at: OffsetDateTime,
) -> Signature {
    let at = at.to_offset(time::UtcOffset::UTC);
    let amz_date = at
        .format(format_description!("[year][month][day]T[hour][minute][second]Z"))
        .unwrap_or_default();
    let date_stamp = &amz_date[..8.min(amz_date.len())];

    let mut headers: Vec<(String, String)> = req
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.push(("host".into(), req.host.to_string()));
    headers.push(("x-amz-date".into(), amz_date.clone()));
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token".into(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let uri = canonical_uri(req.path);
    let payload_hash = hex::encode(Sha256::digest(req.payload));
    let canonical_request = [
        req.method,
        uri.as_str(),
        req.query,
        canonical_headers.as_str(),
        signed_headers.as_str(),
        payload_hash.as_str(),
    ]
    .join("\n");

    let scope = format!("{date_stamp}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, date_stamp, region, service);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    Signature {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
        amz_date,
        signature,
    }
}

/// Non-S3 services expect every path segment encoded a second time.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

pub fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(m) => m,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(SECRET, "20150830", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn signs_documented_iam_request() {
        let creds = AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: SECRET.into(),
            session_token: None,
            expiration: None,
        };
        let req = SignableRequest {
            method: "GET",
            host: "iam.amazonaws.com",
            path: "/",
            query: "Action=ListUsers&Version=2010-05-08",
            headers: &[("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")],
            payload: b"",
        };
        let sig = sign(&req, &creds, "us-east-1", "iam", datetime!(2015-08-30 12:36 UTC));
        assert_eq!(sig.amz_date, "20150830T123600Z");
        assert_eq!(
            sig.signature,
            "5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
        assert_eq!(
            sig.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn model_ids_are_double_encoded_in_canonical_path() {
        let wire = format!(
            "/model/{}/invoke",
            encode_segment("anthropic.claude-3-haiku-20240307-v1:0")
        );
        assert_eq!(wire, "/model/anthropic.claude-3-haiku-20240307-v1%3A0/invoke");
        assert_eq!(
            canonical_uri(&wire),
            "/model/anthropic.claude-3-haiku-20240307-v1%253A0/invoke"
        );
    }

    #[test]
    fn session_token_is_signed() {
        let creds = AwsCredentials {
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
            session_token: Some("session".into()),
            expiration: None,
        };
        let req = SignableRequest {
            method: "POST",
            host: "bedrock-runtime.us-east-1.amazonaws.com",
            path: "/model/m/invoke",
            query: "",
            headers: &[("content-type", "application/json")],
            payload: b"{}",
        };
        let sig = sign(&req, &creds, "us-east-1", "bedrock", datetime!(2026-01-01 00:00 UTC));
        assert!(sig
            .authorization
            .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token"));
    }
}
