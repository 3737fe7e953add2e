// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the model tied to the document it was given.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every risk you report must refer to a clause that actually appears in the \
    contract text provided. Quote or name the clause in `clauseReference`. \
    Do NOT invent clauses, parties, amounts or dates that are not in the text.";
