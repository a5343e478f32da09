//! String utility functions for node names

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Returns the first keyword contained in `s`, if any.
pub fn find_keyword<'a, S: AsRef<str>>(s: &str, keywords: &'a [S]) -> Option<&'a str> {
    keywords
        .iter()
        .map(|k| k.as_ref())
        .find(|k| !k.is_empty() && s.contains(k))
}

/// Random ASCII alphanumeric string of `len` characters.
pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_keyword() {
        let banned = ["HK", "香港"];
        assert_eq!(find_keyword("HK-01", &banned), Some("HK"));
        assert_eq!(find_keyword("香港 02", &banned), Some("香港"));
        assert_eq!(find_keyword("JP-01", &banned), None);
        assert_eq!(find_keyword("anything", &[""]), None);
    }

    #[test]
    fn test_random_alphanumeric() {
        let s = random_alphanumeric(4);
        assert_eq!(s.len(), 4);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
