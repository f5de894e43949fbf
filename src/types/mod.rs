// Public modules
pub mod content;
pub mod file_data;
pub mod finish_reason;
pub mod generate_content_request;
pub mod generate_content_response;
pub mod generation_config;
pub mod message;
pub mod model;
pub mod part;

// Re-exports
pub use content::{Content, ContentRole};
pub use file_data::FileData;
pub use finish_reason::FinishReason;
pub use generate_content_request::GenerateContentRequest;
pub use generate_content_response::{Candidate, GenerateContentResponse, UsageMetadata};
pub use generation_config::GenerationConfig;
pub use message::{Message, MessageId, Role};
pub use model::{KnownModel, Model};
pub use part::Part;
