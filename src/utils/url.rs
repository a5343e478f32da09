//! URL encoding/decoding utilities

/// Decodes a percent-encoded string
///
/// Returns the original string if the decoded bytes are not valid UTF-8.
///
/// # Examples
/// ```
/// use subforge::utils::url::url_decode;
///
/// assert_eq!(url_decode("Tokyo%2001"), "Tokyo 01");
/// assert_eq!(url_decode("%E6%97%A5%E6%9C%AC"), "日本");
/// ```
pub fn url_decode(input: &str) -> String {
    urlencoding::decode(input)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| input.to_string())
}
