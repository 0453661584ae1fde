use crate::constants::platform::{DEFAULT_API_KEY_FIELD, RESPONSE_FORMAT};
use crate::errors::MoldError;
use crate::services::config::{Credentials, SigningAlgorithm};
use crate::utils::encoding::encode_component;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use sha2::Sha256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    pub include_response: bool,
    pub api_key_field: String,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            include_response: true,
            api_key_field: DEFAULT_API_KEY_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub canonical_string: String,
    pub signature_base64: String,
    pub signature_encoded: String,
    pub final_url: String,
    /// Insertion order is the order the query string is emitted in.
    pub effective_params: Vec<(String, String)>,
}

pub fn sign<'a, I>(command: &str, params: I, credentials: &Credentials) -> Result<SignedRequest, MoldError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    sign_with(command, params, credentials, &SignOptions::default())
}

pub fn sign_with<'a, I>(
    command: &str,
    params: I,
    credentials: &Credentials,
    options: &SignOptions,
) -> Result<SignedRequest, MoldError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    credentials.ensure_complete()?;

    let mut effective: Vec<(String, String)> = Vec::new();
    if options.include_response {
        upsert(&mut effective, "response", RESPONSE_FORMAT);
    }
    for (key, value) in params {
        upsert(&mut effective, key, value);
    }
    upsert(&mut effective, "command", command);
    upsert(&mut effective, &options.api_key_field, &credentials.api_key);

    let canonical_string = canonicalize(&effective);
    let signature_base64 = hmac_base64(
        credentials.algorithm,
        credentials.secret_key.as_bytes(),
        canonical_string.as_bytes(),
    );
    let signature_encoded = encode_component(&signature_base64);

    let query = effective
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if credentials.endpoint.contains('?') { '&' } else { '?' };
    let final_url = format!(
        "{}{}{}&signature={}",
        credentials.endpoint, separator, query, signature_encoded
    );

    Ok(SignedRequest {
        canonical_string,
        signature_base64,
        signature_encoded,
        final_url,
        effective_params: effective,
    })
}

fn upsert(set: &mut Vec<(String, String)>, key: &str, value: &str) {
    match set.iter_mut().find(|(existing, _)| existing == key) {
        Some(slot) => slot.1 = value.to_string(),
        None => set.push((key.to_string(), value.to_string())),
    }
}

/// Lower-cased `key=encoded value` pairs sorted by lower-cased key. Ties keep
/// insertion order.
fn canonicalize(effective: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = effective
        .iter()
        .map(|(key, value)| (key.to_lowercase(), encode_component(value).to_lowercase()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn hmac_base64(algorithm: SigningAlgorithm, secret: &[u8], data: &[u8]) -> String {
    let digest = match algorithm {
        SigningAlgorithm::Sha1 => {
            let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(secret)
                .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        SigningAlgorithm::Sha256 => {
            let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret)
                .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    };
    base64::engine::general_purpose::STANDARD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn creds(algorithm: SigningAlgorithm) -> Credentials {
        Credentials::new("https://mold.example/client/api", "AbC key", "s3cret", algorithm)
    }

    fn params(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn hmac_matches_reference_vectors() {
        assert_eq!(
            hmac_base64(SigningAlgorithm::Sha1, b"key", b"The quick brown fox jumps over the lazy dog"),
            "3nybhbi3iqa8ino29wqQcBydtNk="
        );
        assert_eq!(
            hmac_base64(SigningAlgorithm::Sha256, b"key", b"The quick brown fox jumps over the lazy dog"),
            "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
    }

    #[test]
    fn signing_is_stable() {
        let p = params(&[("zoneid", "z-1"), ("name", "web 01"), ("Account", "Admin")]);
        let a = sign("listVirtualMachines", &p, &creds(SigningAlgorithm::Sha256)).unwrap();
        let b = sign("listVirtualMachines", &p, &creds(SigningAlgorithm::Sha256)).unwrap();
        assert_eq!(a.final_url, b.final_url);
        assert_eq!(a.canonical_string, b.canonical_string);
    }

    #[test]
    fn canonical_string_is_lowercased_and_sorted_but_query_keeps_case() {
        let p = params(&[("Zeta", "Up"), ("alpha", "X Y")]);
        let signed = sign("listZones", &p, &creds(SigningAlgorithm::Sha1)).unwrap();
        assert_eq!(
            signed.canonical_string,
            "alpha=x%20y&apikey=abc%20key&command=listzones&response=json&zeta=up"
        );
        assert!(signed
            .final_url
            .starts_with("https://mold.example/client/api?response=json&Zeta=Up&alpha=X%20Y&command=listZones&apiKey=AbC%20key&signature="));
    }

    #[test]
    fn api_key_overrides_caller_value_and_command_stays_last_written() {
        let p = params(&[("apiKey", "spoofed"), ("command", "other")]);
        let signed = sign("listHosts", &p, &creds(SigningAlgorithm::Sha1)).unwrap();
        let lookup = |key: &str| {
            signed
                .effective_params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(lookup("apiKey").as_deref(), Some("AbC key"));
        assert_eq!(lookup("command").as_deref(), Some("listHosts"));
        assert_eq!(signed.effective_params.len(), 3);
    }

    #[test]
    fn separator_follows_existing_query() {
        let mut c = creds(SigningAlgorithm::Sha256);
        c.endpoint = "https://mold.example/client/api?region=a".to_string();
        let signed = sign("listZones", &BTreeMap::new(), &c).unwrap();
        assert!(signed
            .final_url
            .starts_with("https://mold.example/client/api?region=a&response=json"));
        assert!(signed
            .final_url
            .ends_with(&format!("&signature={}", signed.signature_encoded)));
    }

    #[test]
    fn options_control_response_and_key_field() {
        let options = SignOptions {
            include_response: false,
            api_key_field: "apikey".to_string(),
        };
        let signed = sign_with("listZones", &BTreeMap::new(), &creds(SigningAlgorithm::Sha1), &options)
            .unwrap();
        assert_eq!(signed.canonical_string, "apikey=abc%20key&command=listzones");
        assert!(!signed.final_url.contains("response=json"));
    }

    #[test]
    fn incomplete_credentials_fail_before_signing() {
        let mut c = creds(SigningAlgorithm::Sha1);
        c.secret_key.clear();
        let err = sign("listZones", &BTreeMap::new(), &c).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION");
    }

    #[test]
    fn signature_is_percent_encoded_in_url() {
        let signed = sign("listZones", &BTreeMap::new(), &creds(SigningAlgorithm::Sha256)).unwrap();
        assert_eq!(signed.signature_encoded, encode_component(&signed.signature_base64));
        assert!(!signed.signature_encoded.contains('+'));
        assert!(!signed.signature_encoded.contains('/'));
    }
}
