pub mod assets;
pub mod auth;
pub mod error;
pub mod export;
pub mod extractor;
pub mod listing;
pub mod mutations;
pub mod requester;
pub mod transport;

pub use assets::{AssetFetcher, AssetHint};
pub use auth::{BearerToken, CredentialSupplier};
pub use error::{ClientError, Result};
pub use export::{ExportOutcome, Exporter, ProgressEvent};
pub use extractor::{extract_conversation, TraversalProgress};
pub use listing::{list_conversations, ListProgress};
pub use mutations::{
    archive_conversations, delete_conversations, mutate_conversations, Mutation, MutationOutcome,
};
pub use requester::{PacingConfig, RateLimitedRequester};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};
