//! Body and header encodings.
//!
//! Bodies are always sent as Base64 hard-wrapped at [`LINE_WIDTH`] columns.
//! Header text that may carry non-ASCII characters is sent as RFC 2047
//! `B` encoded-words.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum length of a Base64 body line, excluding the CRLF.
pub const LINE_WIDTH: usize = 76;

/// Charset label used in every encoded-word.
const CHARSET: &str = "UTF-8";

/// Maximum length of one encoded-word (RFC 2047 section 2).
pub const MAX_WORD_LEN: usize = 75;

/// Folding between consecutive encoded-words of one header.
const FOLD: &str = "\r\n ";

/// Text bytes per encoded-word, so that the Base64 payload plus the
/// `=?UTF-8?B?` and `?=` delimiters stays within [`MAX_WORD_LEN`].
const WORD_PAYLOAD: usize = (MAX_WORD_LEN - "=?UTF-8?B??=".len()) / 4 * 3;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Encodes data as Base64 split into CRLF-terminated lines of at most
/// [`LINE_WIDTH`] characters. Empty input yields an empty string.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut wrapped = String::with_capacity(encoded.len() + (encoded.len() / LINE_WIDTH + 1) * 2);

    // Base64 output is ASCII: every byte is one char.
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        wrapped.extend(line.iter().copied().map(char::from));
        wrapped.push_str("\r\n");
    }

    wrapped
}

/// Decodes a line-wrapped Base64 body, ignoring all whitespace.
///
/// # Errors
///
/// Returns an error if the remaining characters are not valid Base64.
pub fn decode_base64_wrapped(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    decode_base64(&cleaned)
}

/// Encodes header text as a single RFC 2047 `B` encoded-word.
///
/// The text is always encoded, even when it is plain ASCII, so display names
/// containing specials (`"`, `,`, `<`) never need quoting.
#[must_use]
pub fn encode_word(text: &str) -> String {
    format!("=?{CHARSET}?B?{}?=", encode_base64(text.as_bytes()))
}

/// Encodes header text as RFC 2047 `B` encoded-words of at most
/// [`MAX_WORD_LEN`] characters, folded onto continuation lines.
///
/// Text is split on character boundaries, so no word carries a partial
/// UTF-8 sequence. Empty text yields a single empty word.
#[must_use]
pub fn encode_words(text: &str) -> String {
    let mut words = Vec::with_capacity(text.len() / WORD_PAYLOAD + 1);
    let mut start = 0;

    for (index, c) in text.char_indices() {
        if index + c.len_utf8() - start > WORD_PAYLOAD {
            words.push(encode_word(&text[start..index]));
            start = index;
        }
    }
    words.push(encode_word(&text[start..]));

    words.join(FOLD)
}

/// Decodes an unstructured header value made of encoded-words and plain
/// text, as written by [`encode_words`].
///
/// Whitespace between two adjacent encoded-words is dropped; any other run
/// of whitespace becomes a single space.
///
/// # Errors
///
/// Returns an error if any encoded-word is malformed.
pub fn decode_words(text: &str) -> Result<String> {
    let mut decoded = String::with_capacity(text.len());
    let mut previous: Option<bool> = None;

    for token in text.split_whitespace() {
        let encoded = is_encoded_word(token);
        if previous.is_some_and(|was_encoded| !(was_encoded && encoded)) {
            decoded.push(' ');
        }
        decoded.push_str(&decode_word(token)?);
        previous = Some(encoded);
    }

    Ok(decoded)
}

fn is_encoded_word(token: &str) -> bool {
    token.len() > 4 && token.starts_with("=?") && token.ends_with("?=")
}

/// Decodes an RFC 2047 `B` encoded-word.
///
/// Text that is not an encoded-word is returned unchanged.
///
/// # Errors
///
/// Returns an error if the word is malformed, uses an encoding other than
/// `B`, or does not decode to UTF-8.
pub fn decode_word(text: &str) -> Result<String> {
    let Some(inner) = text.strip_prefix("=?").and_then(|t| t.strip_suffix("?=")) else {
        return Ok(text.to_string());
    };

    let parts: Vec<&str> = inner.split('?').collect();
    let [_charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(format!("Malformed encoded-word: {text}")));
    };

    if !encoding.eq_ignore_ascii_case("b") {
        return Err(Error::InvalidEncoding(format!(
            "Unsupported encoded-word encoding: {encoding}"
        )));
    }

    let decoded = decode_base64(encoded_text)?;
    String::from_utf8(decoded).map_err(Into::into)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_wrapped_short_payload_is_single_line() {
        assert_eq!(encode_base64_wrapped(b"Hello"), "SGVsbG8=\r\n");
    }

    #[test]
    fn test_wrapped_empty_payload() {
        assert_eq!(encode_base64_wrapped(b""), "");
    }

    #[test]
    fn test_wrapped_exact_multiple_has_no_empty_line() {
        // 57 input bytes encode to exactly 76 characters.
        let wrapped = encode_base64_wrapped(&[0u8; 57]);
        assert_eq!(wrapped.len(), LINE_WIDTH + 2);
        assert!(wrapped.ends_with("\r\n"));
        assert!(!wrapped.contains("\r\n\r\n"));
    }

    #[test]
    fn test_wrapped_long_payload_splits_at_width() {
        let wrapped = encode_base64_wrapped(&[0xAB; 200]);
        let lines: Vec<&str> = wrapped.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[..3].iter().all(|l| l.len() == LINE_WIDTH));
        assert!(lines[3].len() < LINE_WIDTH);
    }

    #[test]
    fn test_encode_word_always_encodes() {
        assert_eq!(encode_word("Hello"), "=?UTF-8?B?SGVsbG8=?=");
        assert_eq!(encode_word(""), "=?UTF-8?B??=");
    }

    #[test]
    fn test_decode_word() {
        assert_eq!(decode_word("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_word("plain").unwrap(), "plain");
    }

    #[test]
    fn test_decode_word_rejects_q_encoding() {
        assert!(decode_word("=?utf-8?Q?H=C3=A9llo?=").is_err());
    }

    #[test]
    fn test_decode_word_rejects_malformed() {
        assert!(decode_word("=?utf-8?B?=").is_err());
    }

    #[test]
    fn test_encode_words_short_text_is_one_word() {
        assert_eq!(encode_words("Hello"), "=?UTF-8?B?SGVsbG8=?=");
        assert_eq!(encode_words(""), "=?UTF-8?B??=");
    }

    #[test]
    fn test_encode_words_folds_long_text() {
        let text = "Ж".repeat(400);
        let folded = encode_words(&text);

        let words: Vec<&str> = folded.split(FOLD).collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= MAX_WORD_LEN));
        assert!(words.iter().all(|w| !w.contains(['\r', '\n'])));
        assert_eq!(decode_words(&folded).unwrap(), text);
    }

    #[test]
    fn test_decode_words_keeps_spaces_around_plain_text() {
        assert_eq!(
            decode_words("Re: =?UTF-8?B?SMOp?= =?UTF-8?B?bGxv?= again").unwrap(),
            "Re: Héllo again"
        );
    }

    proptest! {
        #[test]
        fn wrapped_lines_respect_width_and_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let wrapped = encode_base64_wrapped(&data);
            for line in wrapped.split_terminator("\r\n") {
                prop_assert!(line.len() <= LINE_WIDTH);
            }
            prop_assert_eq!(decode_base64_wrapped(&wrapped).unwrap(), data);
        }

        #[test]
        fn encoded_word_round_trips(text in "\\PC*") {
            prop_assert_eq!(decode_word(&encode_word(&text)).unwrap(), text);
        }

        #[test]
        fn folded_words_stay_short_and_round_trip(text in "\\PC{0,300}") {
            let folded = encode_words(&text);
            for word in folded.split(FOLD) {
                prop_assert!(word.len() <= MAX_WORD_LEN);
            }
            prop_assert_eq!(decode_words(&folded).unwrap(), text);
        }
    }
}
