//! Plan → install → code generation pipeline
//!
//! Three sequential completion calls, each with a fresh conversation:
//!
//! ```text
//! request ─→ [plan] ─→ plan text ─┬→ [install] ─→ extract(Install) ─→ installs
//!                                 └→ [code]    ─→ extract(Code)    ─→ code
//! ```

use tracing::{debug, info, warn};

use super::prompts::{
    code_request, CODE_SYSTEM_PROMPT, DEFAULT_SCENARIO_PREAMBLE, INSTALL_SYSTEM_PROMPT,
    PLAN_SYSTEM_PROMPT,
};
use crate::extract::{extract, ExtractionMode};
use crate::llm::{ChatMessage, CompletionClient, CompletionService, DEFAULT_MAX_TOKENS};

/// Shown in place of code when the code stage produced nothing usable
pub const NO_CODE_PLACEHOLDER: &str = "No code received.";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Text prepended to the operator's request in the plan stage
    pub scenario_preamble: String,
    /// Token budget for each stage
    pub max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scenario_preamble: DEFAULT_SCENARIO_PREAMBLE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// What one pipeline run produced
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Plan text, possibly empty
    pub plan: String,
    /// Raw install candidates, not yet deduplicated
    pub installs: Vec<String>,
    /// Extracted program, `None` when the code stage had no qualifying block
    pub code: Option<String>,
}

impl Generation {
    /// The code, or the placeholder when there is none
    pub fn code_or_placeholder(&self) -> &str {
        self.code.as_deref().unwrap_or(NO_CODE_PLACEHOLDER)
    }
}

/// Runs the three generation stages
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub async fn generate<S: CompletionService>(
        &self,
        client: &mut CompletionClient<S>,
        request: &str,
    ) -> Generation {
        let max_tokens = self.config.max_tokens;

        let plan = client
            .complete(
                &[
                    ChatMessage::system(PLAN_SYSTEM_PROMPT),
                    ChatMessage::user(format!("{}{}", self.config.scenario_preamble, request)),
                ],
                max_tokens,
            )
            .await;
        if plan.is_empty() {
            warn!("Plan stage returned no text");
        }
        debug!(plan = %plan, "Plan stage complete");

        let install_text = client
            .complete(
                &[
                    ChatMessage::system(INSTALL_SYSTEM_PROMPT),
                    ChatMessage::user(plan.clone()),
                ],
                max_tokens,
            )
            .await;
        let installs = extract(&install_text, ExtractionMode::Install);
        debug!(raw = %install_text, count = installs.len(), "Install stage complete");

        let code_text = client
            .complete(
                &[
                    ChatMessage::system(CODE_SYSTEM_PROMPT),
                    ChatMessage::user(code_request(&plan, request)),
                ],
                max_tokens,
            )
            .await;
        let code = extract(&code_text, ExtractionMode::Code).into_iter().next();
        match &code {
            Some(code) => info!(code_len = code.len(), installs = installs.len(), "Generated code"),
            None => warn!(response_len = code_text.len(), "Code stage returned no usable code"),
        }

        Generation {
            plan,
            installs,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionError;
    use std::sync::Mutex;

    struct Canned {
        responses: Mutex<Vec<&'static str>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Canned {
        fn new(mut responses: Vec<&'static str>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionService for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _max_tokens: u32,
        ) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .map(str::to_string)
                .ok_or(CompletionError::EmptyResponse)
        }
    }

    #[tokio::test]
    async fn test_three_stages_in_order() {
        let mut client = CompletionClient::new(Canned::new(vec![
            "1. fetch the page\n2. print the title",
            "Run `pip install requests` and `pip install bs4`.",
            "```python\nimport requests\nprint('title')\n```",
        ]));

        let generation = Pipeline::default().generate(&mut client, "print a title").await;

        assert_eq!(client.calls(), 3);
        assert_eq!(generation.installs, vec!["pip install requests", "pip install bs4"]);
        assert_eq!(generation.code.as_deref(), Some("import requests\nprint('title')\n"));

        let seen = client.service().seen.lock().unwrap();
        assert!(seen[0][1].content.ends_with("print a title"));
        assert_eq!(seen[1][1].content, "1. fetch the page\n2. print the title");
        assert!(seen[2][1].content.contains("1. fetch the page"));
        assert!(seen[2][1].content.contains("print a title"));
    }

    #[tokio::test]
    async fn test_missing_code_uses_placeholder() {
        let mut client = CompletionClient::new(Canned::new(vec!["plan", "", "I can't do that."]));

        let generation = Pipeline::default().generate(&mut client, "anything").await;

        assert!(generation.installs.is_empty());
        assert!(generation.code.is_none());
        assert_eq!(generation.code_or_placeholder(), NO_CODE_PLACEHOLDER);
    }
}
