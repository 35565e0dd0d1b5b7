//! Object key generation.
//!
//! Keys are 32 bytes from the operating system CSPRNG rendered either as
//! lowercase hex (videos) or URL-safe base64 without padding (thumbnails),
//! followed by a file extension derived from the declared content type.
//! Client-supplied filenames never take part in a key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Number of random bytes in every generated key.
pub const KEY_BYTES: usize = 32;

/// Textual rendering of the random part of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// 64 lowercase hex characters.
    Hex,
    /// 43 characters from `[A-Za-z0-9_-]`.
    UrlSafeBase64,
}

/// The OS entropy source refused to deliver bytes.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),
}

/// Map a media type essence to the extension used in stored keys.
pub fn extension_for(essence: &str) -> Option<&'static str> {
    match essence {
        "video/mp4" => Some("mp4"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Generate `<random>.<extension>`.
pub fn generate_key(encoding: KeyEncoding, extension: &str) -> Result<String, KeyError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    let stem = match encoding {
        KeyEncoding::Hex => hex::encode(bytes),
        KeyEncoding::UrlSafeBase64 => URL_SAFE_NO_PAD.encode(bytes),
    };
    Ok(format!("{stem}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hex_key_shape() {
        let key = generate_key(KeyEncoding::Hex, "mp4").unwrap();
        let (stem, ext) = key.split_once('.').unwrap();
        assert_eq!(ext, "mp4");
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_base64_key_shape() {
        let key = generate_key(KeyEncoding::UrlSafeBase64, "png").unwrap();
        let (stem, ext) = key.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");
        assert_eq!(stem.len(), 43);
        assert!(stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_keys_do_not_repeat() {
        let keys: HashSet<String> = (0..10_000)
            .map(|_| generate_key(KeyEncoding::Hex, "mp4").unwrap())
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_generated_extension_follows_media_type() {
        for (essence, encoding, ext) in [
            ("video/mp4", KeyEncoding::Hex, "mp4"),
            ("image/jpeg", KeyEncoding::UrlSafeBase64, "jpg"),
            ("image/png", KeyEncoding::UrlSafeBase64, "png"),
            ("image/gif", KeyEncoding::UrlSafeBase64, "gif"),
        ] {
            let key = generate_key(encoding, extension_for(essence).unwrap()).unwrap();
            let (stem, got) = key.rsplit_once('.').unwrap();
            assert_eq!(got, ext, "{essence}");
            assert!(!stem.is_empty());
            assert!(!stem.contains('.'));
        }
    }

    #[test]
    fn test_extension_map() {
        assert_eq!(extension_for("video/mp4"), Some("mp4"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/gif"), Some("gif"));
        assert_eq!(extension_for("video/quicktime"), None);
        assert_eq!(extension_for("image/webp"), None);
    }
}
