use encoding_rs::WINDOWS_1252;

use super::ReadError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes a plain-text upload: UTF-8 when valid, Windows-1252 otherwise.
/// NUL bytes mean the file is binary and is rejected.
pub(super) fn decode_plain_text(bytes: &[u8]) -> Result<String, ReadError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if bytes.contains(&0) {
        return Err(ReadError::Encoding(
            "binary content in a text file".to_string(),
        ));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            Ok(text.into_owned())
        }
    }
}
