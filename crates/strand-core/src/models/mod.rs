pub mod feed;
pub mod profile;
pub mod projection;
pub mod record;
pub mod replies;
pub mod tag;
pub mod thread;

pub use feed::{Cursor, FeedItem, FeedQuery, Page};
pub use profile::Profile;
pub use projection::Projection;
pub use record::{dedup_records, Record};
pub use replies::tally_replies;
pub use tag::{Marker, Tag};
pub use thread::{resolve_parent, resolve_root, ThreadArena, ThreadNode};
