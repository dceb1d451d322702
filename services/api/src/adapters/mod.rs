pub mod db;
pub mod elastic;
pub mod embedding;
pub mod lingo_rank;
pub mod mailer;

pub use db::DbAdapter;
pub use elastic::ElasticsearchAdapter;
pub use embedding::SemanticVectorAdapter;
pub use lingo_rank::LixRanker;
pub use mailer::LogFeedbackMailer;
