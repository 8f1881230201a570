//! Fingerprint keys: 32-hex SHA-256 prefixes over canonicalised inputs.

use sha2::{Digest, Sha256};
use url::Url;

/// Tracking parameters stripped during URL normalisation.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid"];

/// 32-hex prefix of SHA-256 over `input`.
pub fn fingerprint(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..32].to_string()
}

/// Canonicalise a URL for cache keying: drop tracking params, sort the
/// remaining query pairs, strip the fragment.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let mut pairs: Vec<(String, String)> = normalized
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        normalized.set_query(None);
    } else {
        let query = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        normalized.set_query(Some(&query));
    }

    normalized.to_string()
}

/// Key for a conversion result: `cache:<fingerprint(url | options)>`.
pub fn conversion_key(url: &Url, options_suffix: &str) -> String {
    let canonical = format!("{}|{}", normalize_url(url), options_suffix);
    format!("cache:{}", fingerprint(&canonical))
}

/// Key for an `/extract` result: `extract:<H(url)>:<H(schema)>`. The schema
/// value serialises with sorted keys, so equivalent schemas share a key.
pub fn extract_key(url: &Url, schema: &serde_json::Value) -> String {
    let canonical_schema = schema.to_string();
    format!(
        "extract:{}:{}",
        fingerprint(&normalize_url(url)),
        fingerprint(&canonical_schema)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn fingerprint_is_32_hex() {
        let fp = fingerprint("hello");
        assert_eq!(fp.len(), 32);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn normalization_strips_tracking_and_sorts() {
        let a = url("https://example.com/p?utm_source=x&b=2&a=1&fbclid=zzz#frag");
        let b = url("https://example.com/p?a=1&b=2");
        assert_eq!(normalize_url(&a), normalize_url(&b));
    }

    #[test]
    fn differing_real_params_differ() {
        let a = url("https://example.com/p?a=1");
        let b = url("https://example.com/p?a=2");
        assert_ne!(normalize_url(&a), normalize_url(&b));
    }

    #[test]
    fn conversion_keys_depend_on_options() {
        let u = url("https://example.com/p");
        assert_ne!(conversion_key(&u, ""), conversion_key(&u, "mode=fit"));
        assert!(conversion_key(&u, "").starts_with("cache:"));
    }

    #[test]
    fn extract_keys_depend_on_schema() {
        let u = url("https://example.com/p");
        let s1 = serde_json::json!({"type": "object"});
        let s2 = serde_json::json!({"type": "array"});
        assert_ne!(extract_key(&u, &s1), extract_key(&u, &s2));
        assert!(extract_key(&u, &s1).starts_with("extract:"));
    }

    #[test]
    fn equivalent_schemas_share_keys() {
        // serde_json maps are ordered, so key order in the literal does not
        // change the serialisation.
        let u = url("https://example.com/p");
        let s1: serde_json::Value =
            serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let s2: serde_json::Value =
            serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(extract_key(&u, &s1), extract_key(&u, &s2));
    }
}
