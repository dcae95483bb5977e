mod template;
mod variations;

pub use template::{DEFAULT_TEMPLATE, FALLBACK_PROMPT, PromptTemplate, PromptTemplateFields};
pub use variations::expand_variations;
