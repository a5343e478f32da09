use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Encodes a string to Base64 format.
pub fn base64_encode(input: &str) -> String {
    STANDARD.encode(input)
}

/// Decodes standard or URL-safe Base64, with or without padding.
///
/// Whitespace (line breaks of wrapped subscription bodies) is ignored.
/// Returns `None` if the input is not Base64 in either alphabet.
pub fn base64_decode(input: &str) -> Option<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    STANDARD_LENIENT
        .decode(&compact)
        .or_else(|_| URL_SAFE_LENIENT.decode(&compact))
        .ok()
}

/// Decodes Base64 into UTF-8 text, `None` on invalid Base64 or invalid UTF-8.
pub fn base64_decode_str(input: &str) -> Option<String> {
    base64_decode(input).and_then(|bytes| String::from_utf8(bytes).ok())
}
