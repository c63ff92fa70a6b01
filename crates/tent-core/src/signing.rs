//! Hawk request signing.
//!
//! Every authenticated request carries an `Authorization: Hawk ...` header
//! whose MAC binds the method, the request target, a timestamp, a nonce and,
//! when there is a body, a hash of that body keyed by its media type:
//!
//! 1. `hash = base64(SHA-256("hawk.1.payload\n" + media_type + "\n" + body + "\n"))`
//! 2. normalized string: `hawk.1.header`, ts, nonce, METHOD, resource, host,
//!    port, hash, ext, then app and dlg when an app is set, one per line
//! 3. `mac = base64(HMAC-SHA256(key, normalized))`
//!
//! The media type is taken from the `Content-Type` actually sent, so a body
//! declared as one type but hashed as another fails verification.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::post::media_type;

type HmacSha256 = Hmac<Sha256>;

const HEADER_PREFIX: &str = "hawk.1.header";
const PAYLOAD_PREFIX: &str = "hawk.1.payload";

/// A request body as it will be sent.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    /// The literal `Content-Type` header value.
    pub content_type: &'a str,
    pub body: &'a [u8],
}

/// Hash a request body for inclusion in the MAC.
pub fn payload_hash(content_type: &str, body: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(PAYLOAD_PREFIX.as_bytes());
    h.update(b"\n");
    h.update(media_type(content_type).as_bytes());
    h.update(b"\n");
    h.update(body);
    h.update(b"\n");
    STANDARD.encode(h.finalize())
}

/// Build the `Authorization` header for a request, using the current time
/// and a fresh random nonce.
pub fn authorization_header(
    credentials: &Credentials,
    method: &str,
    url: &str,
    payload: Option<Payload<'_>>,
) -> Result<String> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    authorization_header_at(credentials, method, url, payload, ts, &new_nonce())
}

/// Build the `Authorization` header with an explicit timestamp and nonce.
pub fn authorization_header_at(
    credentials: &Credentials,
    method: &str,
    url: &str,
    payload: Option<Payload<'_>>,
    ts: u64,
    nonce: &str,
) -> Result<String> {
    let target = Target::parse(url)?;
    let hash = payload.map(|p| payload_hash(p.content_type, p.body));
    let mac = request_mac(credentials, method, &target, ts, nonce, hash.as_deref())?;
    let mac = STANDARD.encode(mac.finalize().into_bytes());

    let mut header = format!(
        "Hawk id=\"{}\", mac=\"{}\", ts=\"{}\", nonce=\"{}\"",
        credentials.id, mac, ts, nonce
    );
    if let Some(hash) = hash {
        header.push_str(&format!(", hash=\"{hash}\""));
    }
    if let Some(app) = &credentials.app {
        header.push_str(&format!(", app=\"{app}\""));
    }
    Ok(header)
}

/// Check a received `Authorization` header against the request it arrived
/// with.
///
/// The MAC is always checked. When the request has a body, the header must
/// carry a hash and it must match the body under the declared media type.
pub fn verify_authorization(
    credentials: &Credentials,
    header: &str,
    method: &str,
    url: &str,
    payload: Option<Payload<'_>>,
) -> Result<()> {
    let attrs = parse_header(header)?;
    let field = |name: &str| {
        attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };
    let require = |name: &str| field(name).ok_or_else(|| Error::InvalidHeader(format!("missing {name}")));

    if require("id")? != credentials.id {
        return Err(Error::MacMismatch);
    }
    let ts: u64 = require("ts")?
        .parse()
        .map_err(|_| Error::InvalidHeader("ts is not an integer".into()))?;
    let nonce = require("nonce")?;
    let hash = field("hash");

    let received = STANDARD
        .decode(require("mac")?)
        .map_err(|e| Error::InvalidHeader(format!("mac: {e}")))?;
    let target = Target::parse(url)?;
    request_mac(credentials, method, &target, ts, nonce, hash)?
        .verify_slice(&received)
        .map_err(|_| Error::MacMismatch)?;

    if let Some(payload) = payload {
        match hash {
            Some(hash) if hash == payload_hash(payload.content_type, payload.body) => {}
            _ => return Err(Error::PayloadMismatch),
        }
    }
    Ok(())
}

/// The parts of the request URL that enter the MAC.
struct Target {
    resource: String,
    host: String,
    port: u16,
}

impl Target {
    fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("{url}: missing host")))?
            .to_ascii_lowercase();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidUrl(format!("{url}: unknown port")))?;
        // The path stays percent-encoded exactly as it will go on the wire.
        let mut resource = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            resource.push('?');
            resource.push_str(query);
        }
        Ok(Self { resource, host, port })
    }
}

fn request_mac(
    credentials: &Credentials,
    method: &str,
    target: &Target,
    ts: u64,
    nonce: &str,
    hash: Option<&str>,
) -> Result<HmacSha256> {
    let mut normalized = format!(
        "{HEADER_PREFIX}\n{ts}\n{nonce}\n{}\n{}\n{}\n{}\n{}\n\n",
        method.to_ascii_uppercase(),
        target.resource,
        target.host,
        target.port,
        hash.unwrap_or_default(),
    );
    if let Some(app) = &credentials.app {
        normalized.push_str(app);
        normalized.push_str("\n\n");
    }

    let mut mac = HmacSha256::new_from_slice(credentials.key.as_bytes())
        .map_err(|e| Error::InvalidField { field: "hawk_key".into(), reason: e.to_string() })?;
    mac.update(normalized.as_bytes());
    Ok(mac)
}

fn new_nonce() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 8]>())
}

/// Split `Hawk k="v", k2="v2"` into its attributes.
fn parse_header(header: &str) -> Result<Vec<(String, String)>> {
    let rest = header
        .trim()
        .strip_prefix("Hawk ")
        .ok_or_else(|| Error::InvalidHeader("not a Hawk header".into()))?;
    rest.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| Error::InvalidHeader(format!("bad attribute: {part}")))?;
            let value = value
                .trim()
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| Error::InvalidHeader(format!("unquoted attribute: {part}")))?;
            Ok((name.trim().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            id: "dh37fgj492je".into(),
            key: "werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn".into(),
            app: None,
        }
    }

    #[test]
    fn matches_the_hawk_reference_vector() {
        // The Hawk README request, sent without ext data.
        let header = authorization_header_at(
            &creds(),
            "GET",
            "http://example.com:8000/resource/1?b=1&a=2",
            None,
            1353832234,
            "j4h3g2",
        )
        .unwrap();
        assert_eq!(
            header,
            "Hawk id=\"dh37fgj492je\", mac=\"nfp3t5BVkMvjhU3PrD0ftTp7NcVpETEX2HEi/Fo4S2g=\", ts=\"1353832234\", nonce=\"j4h3g2\""
        );
    }

    #[test]
    fn payload_hash_matches_the_hawk_reference_vector() {
        assert_eq!(
            payload_hash("text/plain", b"Thank you for flying Hawk"),
            "Yi9LfIIFRtBEPt74PVmbTF/xVAwPn7ub15ePICfgnuY="
        );
    }

    #[test]
    fn payload_hash_ignores_content_type_parameters() {
        assert_eq!(
            payload_hash("Text/Plain; charset=utf-8", b"x"),
            payload_hash("text/plain", b"x")
        );
    }

    #[test]
    fn signed_request_verifies() {
        let mut c = creds();
        c.app = Some("app-post-id".into());
        let body = br#"{"type":"https://tent.io/types/status/v0#"}"#;
        let payload = Payload { content_type: "application/vnd.tent.post.v0+json", body };
        let url = "https://alice.example/posts?x=%2Fy";
        let header = authorization_header(&c, "POST", url, Some(payload)).unwrap();
        assert!(header.contains(", hash=\""));
        assert!(header.ends_with(", app=\"app-post-id\""));
        verify_authorization(&c, &header, "POST", url, Some(payload)).unwrap();
    }

    #[test]
    fn mismatched_media_type_is_rejected() {
        let c = creds();
        let body = b"{}";
        let signed = Payload { content_type: "application/json", body };
        let sent = Payload { content_type: "application/vnd.tent.post.v0+json", body };
        let url = "https://alice.example/posts";
        let header = authorization_header(&c, "POST", url, Some(signed)).unwrap();
        let err = verify_authorization(&c, &header, "POST", url, Some(sent)).unwrap_err();
        assert!(matches!(err, Error::PayloadMismatch));
    }

    #[test]
    fn tampered_request_is_rejected() {
        let c = creds();
        let header = authorization_header(&c, "GET", "https://alice.example/posts/1", None).unwrap();
        let err = verify_authorization(&c, &header, "DELETE", "https://alice.example/posts/1", None)
            .unwrap_err();
        assert!(matches!(err, Error::MacMismatch));
        let err = verify_authorization(&c, &header, "GET", "https://alice.example/posts/2", None)
            .unwrap_err();
        assert!(matches!(err, Error::MacMismatch));
    }

    #[test]
    fn percent_encoding_in_the_path_is_signed_verbatim() {
        let target = Target::parse("https://a.example/posts/https%3A%2F%2Fb.example/p1").unwrap();
        assert_eq!(target.resource, "/posts/https%3A%2F%2Fb.example/p1");
        assert_eq!(target.host, "a.example");
        assert_eq!(target.port, 443);
    }

    #[test]
    fn nonces_are_fresh() {
        assert_ne!(new_nonce(), new_nonce());
        assert_eq!(new_nonce().len(), 11);
    }
}
