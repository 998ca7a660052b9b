// ── Domain model ──

mod camera;
mod mac;
mod switch;

pub use camera::{Attachment, Camera};
pub(crate) use camera::elapsed_beyond;
pub use mac::{MAC_TEXT_LEN, MacAddress, MacParseError};
pub use switch::{Switch, netmask, with_last_octet};
