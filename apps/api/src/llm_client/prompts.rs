// Shared prompt fragments.
// Each module that calls the LLM defines its own prompts.rs alongside it;
// this file only holds instructions every prompt ends with.

/// Instruction that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
