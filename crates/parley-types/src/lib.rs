pub mod api;
pub mod models;

pub use models::{
    Comment, CommentId, ContentType, Conversation, ConversationId, ConversationKind,
    ConversationSummary, Message, MessageId, MessageStatus, MessageWithSender, User,
};
