pub mod explodes;
pub mod subparser;
pub mod types;

pub use explodes::normalize;
pub use subparser::{explode_content, explode_links, explode_sources, explode_structured};
pub use types::{ParseError, SourcePayload};
