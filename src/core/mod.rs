pub mod git;
pub mod prompt;

pub use git::{ChangeExtractor, CommitChanges, ExtractError};
pub use prompt::ReviewPromptBuilder;
