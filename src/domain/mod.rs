pub mod item;
pub mod profile;
pub mod record;
pub mod session;
pub mod window;

pub use item::{ContentItem, TYPE_ORIGINAL, TYPE_QUOTE, TYPE_RESHARE};
pub use profile::Profile;
pub use record::{Author, Media, Post, RawRecord, WireRecord};
pub use session::{Cookie, Session};
pub use window::FetchWindow;
