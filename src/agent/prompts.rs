//! Prompt text for each completion request the loop makes

/// Most bytes of run output quoted back to the model; the tail is kept
pub const MAX_ERROR_CONTEXT: usize = 4096;

/// Prepended to the operator's request in the plan stage
pub const DEFAULT_SCENARIO_PREAMBLE: &str = "Request: I'm working on a headless Linux machine and need a Python script named temp_code_to_execute.py. Specifically, I'd like the script to ";

pub const PLAN_SYSTEM_PROMPT: &str = "Do not include any code snippets or actual code in your answer. Write a step-by-step plan describing how to achieve the request.";

pub const INSTALL_SYSTEM_PROMPT: &str = "Based on this plan, list the pip or apt-get commands needed to install everything it requires. Put each command in backticks.";

pub const CODE_SYSTEM_PROMPT: &str = "Now provide the actual Python code that implements the plan. The code must be enclosed in a single markdown code block.";

pub const REVISION_SYSTEM_PROMPT: &str = "Here is my code and the changes I would like. Provide the full updated code in a single markdown code block.";

pub const DIAGNOSTIC_SYSTEM_PROMPT: &str = "The user ran into an error with this code. Explain the fix and provide the corrected code in a single markdown code block.";

/// User message for the code stage
pub fn code_request(plan: &str, request: &str) -> String {
    format!(
        "Based on this plan:\n{}\n\nprovide the Python code for my request: {}",
        plan, request
    )
}

/// User message asking for a revised program
///
/// `error` is the text of the last failed run, if there was one.
pub fn revision_request(code: &str, error: Option<&str>, feedback: &str) -> String {
    format!(
        "My code executed as follows:\n```\n{}\n```\nExecution Error: {}\n\nI would like to make these changes: {}\n\nPlease provide the full updated code",
        code,
        error.map(tail).unwrap_or("None"),
        feedback
    )
}

/// User message asking why a run failed
pub fn diagnostic_request(code: &str, output: &str) -> String {
    format!(
        "Here's the code that caused an error:\n```\n{}\n```\nError output:\n{}\n\nHow can I fix this error?",
        code,
        tail(output)
    )
}

/// Last `MAX_ERROR_CONTEXT` bytes of `text`, cut on a character boundary.
///
/// Tracebacks put the exception line last.
fn tail(text: &str) -> &str {
    if text.len() <= MAX_ERROR_CONTEXT {
        return text;
    }
    let mut start = text.len() - MAX_ERROR_CONTEXT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
