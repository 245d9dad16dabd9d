//! One-shot notices carried across a redirect in a signed cookie.

use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

const COOKIE_NAME: &str = "flash";
const CLEAR_COOKIE: &str = "flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

impl FlashMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }
}

#[derive(Clone)]
pub struct FlashSigner {
    key: Arc<[u8]>,
}

impl FlashSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::from(secret.as_bytes()),
        }
    }

    fn mac(&self) -> Option<Hmac<Sha256>> {
        Hmac::<Sha256>::new_from_slice(&self.key).ok()
    }

    /// `hex(json).hex(hmac)`
    pub fn encode(&self, messages: &[FlashMessage]) -> String {
        let payload = hex::encode(serde_json::to_vec(messages).unwrap_or_default());
        let Some(mut mac) = self.mac() else {
            return String::new();
        };
        mac.update(payload.as_bytes());
        format!("{payload}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// None for tampered, foreign or malformed values.
    pub fn decode(&self, value: &str) -> Option<Vec<FlashMessage>> {
        let (payload, sig) = value.split_once('.')?;
        let sig = hex::decode(sig).ok()?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig).ok()?;
        serde_json::from_slice(&hex::decode(payload).ok()?).ok()
    }

    /// Redirect to `to`, showing `message` on the next page render.
    pub fn redirect(&self, to: &str, message: FlashMessage) -> Response {
        let cookie = format!(
            "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax",
            self.encode(&[message])
        );
        let mut resp = StatusCode::SEE_OTHER.into_response();
        let headers = resp.headers_mut();
        if let Ok(v) = HeaderValue::from_str(to) {
            headers.insert(LOCATION, v);
        }
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            headers.insert(SET_COOKIE, v);
        }
        resp
    }

    /// Messages from the request cookie, and whether a flash cookie needs clearing.
    pub fn take(&self, headers: &HeaderMap) -> (Vec<FlashMessage>, bool) {
        let Some(raw) = cookie_value(headers, COOKIE_NAME) else {
            return (Vec::new(), false);
        };
        (self.decode(&raw).unwrap_or_default(), true)
    }
}

pub fn clear_cookie() -> HeaderValue {
    HeaderValue::from_static(CLEAR_COOKIE)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}
