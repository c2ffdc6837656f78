pub mod adapter;
pub mod catalog;
pub mod error;
pub mod rate_limit;
pub mod registry;
pub mod rest;
pub mod retry;

pub use adapter::{
    CommentPage, CommentReply, CommentThread, ContentPage, ContentStub, PlatformAdapter,
    PublishContent, PublishReceipt, RemoteContentItem, RemoteProfile, TokenGrant,
};
pub use catalog::{spec_for, PlatformSpec};
pub use error::AdapterError;
pub use registry::AdapterRegistry;
pub use rest::RestAdapter;
pub use retry::retry_with_backoff;
