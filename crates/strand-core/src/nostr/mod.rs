pub mod auth;
pub mod gateway;
pub mod publish;
pub mod relay;

pub use auth::KeySigner;
pub use gateway::{RecordFilter, SourceGateway};
pub use publish::{edit_contact_tags, reply_tags, ContactEdit};
pub use relay::RelayGateway;
