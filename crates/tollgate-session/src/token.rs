//! Token value generation.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// The shape of generated token values.
///
/// Every style draws from the thread-local CSPRNG; they differ only in
/// alphabet and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenStyle {
    /// 16 random bytes as 32 lowercase hex characters (128 bits).
    #[default]
    Hex128,
    /// 32 alphanumeric characters.
    Random32,
    /// 64 alphanumeric characters.
    Random64,
    /// 128 alphanumeric characters.
    Random128,
}

/// Generates a fresh token value in the given style.
pub fn generate_token(style: TokenStyle) -> String {
    let mut rng = rand::rng();
    match style {
        TokenStyle::Hex128 => {
            let bytes: [u8; 16] = rng.random();
            bytes.iter().map(|b| format!("{b:02x}")).collect()
        }
        TokenStyle::Random32 => alphanumeric(&mut rng, 32),
        TokenStyle::Random64 => alphanumeric(&mut rng, 64),
        TokenStyle::Random128 => alphanumeric(&mut rng, 128),
    }
}

fn alphanumeric(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Short, log-safe prefix of a token.
///
/// Full token values are bearer secrets and never go to the logs.
pub(crate) fn redact(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_hex128_is_32_hex_chars() {
        let token = generate_token(TokenStyle::Hex128);
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_random_styles_lengths() {
        assert_eq!(generate_token(TokenStyle::Random32).len(), 32);
        assert_eq!(generate_token(TokenStyle::Random64).len(), 64);
        assert_eq!(generate_token(TokenStyle::Random128).len(), 128);
        assert!(
            generate_token(TokenStyle::Random64)
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        );
    }

    #[test]
    fn test_generate_token_is_unique() {
        let a = generate_token(TokenStyle::Hex128);
        let b = generate_token(TokenStyle::Hex128);
        assert_ne!(a, b, "tokens must not collide");
    }

    #[test]
    fn test_redact_keeps_prefix_only() {
        assert_eq!(redact("0123456789abcdef"), "01234567");
        assert_eq!(redact("abc"), "abc");
    }

    #[test]
    fn test_token_style_kebab_case_serde() {
        let style: TokenStyle = serde_json::from_str("\"random-64\"").unwrap();
        assert_eq!(style, TokenStyle::Random64);
    }
}
