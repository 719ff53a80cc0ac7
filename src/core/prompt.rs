use serde::{Deserialize, Serialize};

/// House style rules embedded into every review request.
pub const STYLE_GUIDE: &str = r#"- Use CamelCase or camelCase - Go convention prefers MixedCaps over underscores. Abbreviations should maintain case consistency (e.g., HTTPPort, not HttpPort).
- Avoid ALL_CAPS unless it's an environment variable - Using ALL_CAPS can be misleading as it resembles environment variables.
- Use short names in context - Avoid redundant information in variable names when the context is clear (e.g., username, password instead of basicAuthUsername, basicAuthPassword).
- Be strategic when adding new code to functions and structs - Follow existing patterns and logical order when inserting new code, ensuring clarity and maintainability.
- Refactor without changing behavior - Any refactoring should maintain the exact functionality while improving readability or efficiency.
- Use Go-style function parameters - Write func foo(a, b, c string), not func foo(a string, b string, c string).
- Group related struct fields together - Fields with similar roles (e.g., UserID and GroupID for ownership) should be placed next to each other for clarity.
- Use errors.Is() for error handling - Instead of string matching, use errors.Is(err, targetErr) to check specific error types.
- Avoid unnecessary small functions - If a function is a one-liner or only used once in a simple context, it may not be necessary.
- Use iota carefully in constants - When using iota, consider starting from iota + 1 to avoid unintended zero values in enumerations."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub user_prompt_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a diligent code review assistant who evaluates code based on \
                            ORIGINAL CODE, GIT DIFF, and CODE STYLE GUIDE. Your primary goal is \
                            to provide constructive feedback and suggestions for improvement."
                .to_string(),
            user_prompt_template: r#"# Code Review Request

## Original Code
{original_code}

## Git Changes
{diff}

## Code Style Guide
{style_guide}

Please review the code changes and provide feedback based on the Code Style Guide."#
                .to_string(),
        }
    }
}

pub struct ReviewPromptBuilder {
    config: PromptConfig,
}

impl ReviewPromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Fills the template and returns the `(system, user)` message pair.
    pub fn build_prompt(&self, original_code: &str, diff: &str) -> (String, String) {
        let user_prompt = self
            .config
            .user_prompt_template
            .replace("{original_code}", original_code)
            .replace("{diff}", diff)
            .replace("{style_guide}", STYLE_GUIDE);

        (self.config.system_prompt.clone(), user_prompt)
    }
}
