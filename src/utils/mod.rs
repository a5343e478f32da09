pub mod base64;
pub mod file;
pub mod http;
pub mod string;
pub mod url;

// Re-export common utilities
pub use self::base64::{base64_decode, base64_decode_str};
pub use self::file::{file_exists, file_get, file_write};
pub use self::string::{find_keyword, random_alphanumeric};
pub use self::url::url_decode;
