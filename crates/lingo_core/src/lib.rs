pub mod domain;
pub mod memory;
pub mod ports;
pub mod profile;
pub mod projection;
pub mod sessions;
pub mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use domain::{
    Article, BulkInstruction, BulkOperation, CefrLevel, IndexedDocument, Language, NewUser,
    SchemaVersion, Session, TopicMapping, TopicOrigin, User, UserCredentials,
};
pub use ports::{
    DatabaseService, DifficultyRanker, EmbeddingService, FeedbackMailer, IndexError,
    IndexResult, PortError, PortResult, SearchIndex,
};
pub use sync::{SearchIndexSynchronizer, UpsertOutcome};
