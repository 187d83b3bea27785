//! API entities
//!
//! Field mapping between the Mastodon wire format and typed entities. Each
//! type here implements [`Entity`](crate::resource::Entity) and is listed in
//! the resource registry.

mod account;
mod application;
mod instance;
mod media;
mod status;
mod timeline;

pub use account::Account;
pub use application::{Application, REDIRECT_NONE};
pub use instance::Instance;
pub use media::{MediaAttachment, MediaType, Metadata};
pub use status::{Emoji, Mention, Status, StatusApplication, Tag, Visibility};
pub use timeline::Timeline;
