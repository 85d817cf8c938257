//! Identity and addressing primitives shared by every layer.

mod field;
mod pid;
mod uri;

pub use field::Field;
pub use pid::Pid;
pub use uri::{BaseUriTranslator, UriTranslator};
