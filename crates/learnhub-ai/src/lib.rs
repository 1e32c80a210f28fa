pub mod assistant;
pub mod chat;
pub mod files;
mod http;
pub mod refine;

pub use assistant::{AssistantClient, AssistantConfig};
pub use chat::{strip_source_glyphs, ChatClient, ChatCompletionOptions, ChatConfig};
pub use files::{
    FileMeta, NoteFormat, RemovalOutcome, UploadOutcome, VectorFileConfig, VectorFileList,
    VectorFileManager, VectorFileRecord,
};
pub use refine::refine_assistant_output;
