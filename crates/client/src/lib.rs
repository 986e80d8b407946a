//! Client-side synchronization engine for Roomchat conversations.
//!
//! A [`ConversationView`] owns one conversation's [`MessageStore`]. History
//! arrives through the [`PageFetcher`], live pushes through the
//! [`LiveEventMerger`]; both write only via the store's two entry points.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod merger;
pub mod store;
pub mod transport;
pub mod view;

pub use config::ClientConfig;
pub use error::{SyncError, SyncResult};
pub use fetcher::{FetchOutcome, MessageSource, PageFetcher};
pub use http::{HttpClient, RoomApi, RoomSnapshot};
pub use merger::{LiveEventMerger, MergeEvent, Subscription};
pub use store::{lock_store, MergeOutcome, MessageStore, Page, SharedStore, UpsertOutcome};
pub use transport::{GatewayTransport, TransportEvent};
pub use view::ConversationView;
