use once_cell::sync::Lazy;
use regex::Regex;

const MASK: &str = "***";

static SIGNED_QUERY_SECRETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([?&](?:apikey|signature)=)[^&]*").expect("signed query regex")
});

/// Keeps the first and last four characters of longer secrets.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 8 {
        return "*".repeat(count);
    }
    let head: String = value.chars().take(4).collect();
    let tail: String = value.chars().skip(count - 4).collect();
    format!("{}{}{}", head, MASK, tail)
}

/// Masks the `apiKey` and `signature` query values of a signed request URL.
pub fn redact_signed_url(url: &str) -> String {
    SIGNED_QUERY_SECRETS
        .replace_all(url, format!("${{1}}{}", MASK).as_str())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secret_matches_length_rules() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret("abcdefgh"), "********");
        assert_eq!(mask_secret("abcdefghij"), "abcd***ghij");
    }

    #[test]
    fn redact_signed_url_hides_key_and_signature() {
        let url = "https://m/client/api?command=listZones&apiKey=KEY123&response=json&signature=abc%2B%3D";
        assert_eq!(
            redact_signed_url(url),
            "https://m/client/api?command=listZones&apiKey=***&response=json&signature=***"
        );
        assert_eq!(
            redact_signed_url("https://m/api?apikey=k&signature=s"),
            "https://m/api?apikey=***&signature=***"
        );
    }
}
