pub mod config;
pub mod conversation;
pub mod error;
pub mod render;
pub mod tree;

pub use config::ExportConfig;
pub use conversation::{
    Asset, CodeOutput, ConversationDetail, ConversationFailure, ConversationPage,
    ConversationSummary, DocumentRecord, DocumentRevision, ExportSession, ExtractedConversation,
    ExtractedMessage, MessageNode, NodeContent, NodeMessage, Role, Segment, SessionStats,
};
pub use error::{CoreError, Result};
pub use render::{render, render_as, Artifact, ExportFormat};
pub use tree::{mapping_order, MessageTree};
