pub mod claude;
pub mod error;
mod http;
pub mod openai;
pub mod openrouter;
pub mod schema;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use error::AiError;
pub use openai::OpenAi;
pub use openrouter::OpenRouter;
pub use schema::{output_schema, StructuredOutput};
pub use traits::{Completion, CompletionProvider, CompletionRequest, Usage};
pub use util::{extract_json_object, strip_code_blocks, truncate_to_char_boundary};
