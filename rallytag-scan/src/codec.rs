use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Path marker of the verification entry point. Encoded codes are
/// plain URLs against this path so a generic camera app can open them
/// without going through our scanner.
pub const VERIFY_PATH: &str = "/match-verify";

/// A decoded code, whatever wire format it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePayload {
    pub match_id: String,
    pub secret: String,
}

/// Wire format of a raw payload, resolved by content sniffing before
/// parsing so the two parse paths stay independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Url,
    LegacyJson,
}

/// Legacy scanner payload, accepted on decode only.
#[derive(Debug, Deserialize)]
struct LegacyPayload {
    #[serde(rename = "matchId")]
    match_id: String,
    code: String,
}

/// Encode a (match id, secret) pair as a verification URL.
pub fn encode(base_url: &str, match_id: &str, secret: &str) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ScanError::malformed(format!("bad base url: {}", e)))?;
    url.set_path(VERIFY_PATH);
    url.query_pairs_mut()
        .clear()
        .append_pair("id", match_id)
        .append_pair("code", secret);
    Ok(url.into())
}

/// Classify a raw payload. `None` means it is neither of the two
/// formats we have ever produced.
pub fn sniff(raw: &str) -> Option<PayloadKind> {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(PayloadKind::Url);
    }
    if trimmed.contains(VERIFY_PATH) {
        return Some(PayloadKind::Url);
    }
    if trimmed.starts_with('{') {
        return Some(PayloadKind::LegacyJson);
    }
    None
}

/// Decode a raw scanned or typed payload into a [`CodePayload`].
pub fn decode(raw: &str) -> Result<CodePayload> {
    match sniff(raw) {
        Some(PayloadKind::Url) => decode_url(raw.trim()),
        Some(PayloadKind::LegacyJson) => decode_legacy_json(raw.trim()),
        None => Err(ScanError::malformed("unrecognized payload")),
    }
}

fn decode_url(raw: &str) -> Result<CodePayload> {
    // Scheme-less payloads (a bare path with the verification marker)
    // are parsed against a placeholder origin; only the query matters.
    let url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!(
            "https://scan.invalid/{}",
            raw.trim_start_matches('/')
        ))
    }
    .map_err(|e| ScanError::malformed(format!("bad url: {}", e)))?;

    let (mut match_id, mut secret) = (None, None);
    read_pairs(url.query_pairs(), &mut match_id, &mut secret);

    // Fragment-routed links hide the query inside the fragment:
    // https://x/#/match-verify?id=...&code=...
    if match_id.is_none() || secret.is_none() {
        if let Some(frag) = url.fragment() {
            if let Some((_, query)) = frag.split_once('?') {
                read_pairs(
                    url::form_urlencoded::parse(query.as_bytes()),
                    &mut match_id,
                    &mut secret,
                );
            }
        }
    }

    match (match_id, secret) {
        (Some(id), Some(code)) if !id.is_empty() && !code.is_empty() => Ok(CodePayload {
            match_id: id,
            secret: code,
        }),
        _ => Err(ScanError::malformed("missing id or code parameter")),
    }
}

fn read_pairs<'a>(
    pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    match_id: &mut Option<String>,
    secret: &mut Option<String>,
) {
    for (key, value) in pairs {
        match key.as_ref() {
            "id" if match_id.is_none() => *match_id = Some(value.into_owned()),
            "code" if secret.is_none() => *secret = Some(value.into_owned()),
            _ => {}
        }
    }
}

fn decode_legacy_json(raw: &str) -> Result<CodePayload> {
    let legacy: LegacyPayload = serde_json::from_str(raw)
        .map_err(|e| ScanError::malformed(format!("bad legacy payload: {}", e)))?;

    if legacy.match_id.is_empty() || legacy.code.is_empty() {
        return Err(ScanError::malformed("empty matchId or code"));
    }

    Ok(CodePayload {
        match_id: legacy.match_id,
        secret: legacy.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let encoded = encode("https://rallytag.app", "m1", "7F2QK1").unwrap();
        assert_eq!(encoded, "https://rallytag.app/match-verify?id=m1&code=7F2QK1");

        let payload = decode(&encoded).unwrap();
        assert_eq!(payload.match_id, "m1");
        assert_eq!(payload.secret, "7F2QK1");
    }

    #[test]
    fn test_encode_replaces_base_path_and_query() {
        let encoded = encode("https://rallytag.app/some/page?x=1", "m2", "ABCDEF").unwrap();
        let payload = decode(&encoded).unwrap();
        assert_eq!(payload.match_id, "m2");
        assert_eq!(payload.secret, "ABCDEF");
    }

    #[test]
    fn test_legacy_json_matches_url_form() {
        let from_url = decode("https://x/match-verify?id=m1&code=7F2QK1").unwrap();
        let from_json = decode(r#"{"matchId": "m1", "code": "7F2QK1"}"#).unwrap();
        assert_eq!(from_url, from_json);
    }

    #[test]
    fn test_fragment_routed_url() {
        let payload = decode("https://rallytag.app/#/match-verify?id=m9&code=XYZ234").unwrap();
        assert_eq!(payload.match_id, "m9");
        assert_eq!(payload.secret, "XYZ234");
    }

    #[test]
    fn test_schemeless_path_with_marker() {
        let payload = decode("/match-verify?id=m3&code=Q2W3E4").unwrap();
        assert_eq!(payload.match_id, "m3");
        assert_eq!(payload.secret, "Q2W3E4");
    }

    #[test]
    fn test_sniff_is_a_tagged_decision() {
        assert_eq!(sniff("https://x/match-verify?id=a&code=b"), Some(PayloadKind::Url));
        assert_eq!(sniff("/match-verify?id=a&code=b"), Some(PayloadKind::Url));
        assert_eq!(sniff(r#"{"matchId":"a","code":"b"}"#), Some(PayloadKind::LegacyJson));
        assert_eq!(sniff("WIFI:T:WPA;S:cafe;;"), None);
    }

    #[test]
    fn test_garbage_is_malformed_not_panic() {
        for raw in [
            "",
            "not a payload",
            "https://x/match-verify",
            "https://x/match-verify?id=&code=",
            "https://x/match-verify?id=m1",
            "{",
            r#"{"matchId": "", "code": ""}"#,
            r#"{"something": "else"}"#,
        ] {
            assert!(
                matches!(decode(raw), Err(ScanError::MalformedPayload(_))),
                "expected malformed for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_url_escaping_survives_round_trip() {
        let encoded = encode("https://rallytag.app", "m 1/&", "A+B=C").unwrap();
        let payload = decode(&encoded).unwrap();
        assert_eq!(payload.match_id, "m 1/&");
        assert_eq!(payload.secret, "A+B=C");
    }
}
