//! Prompt-safety suffixes appended to caller-built prompts.
//!
//! The repair pipeline can fix a lot, but the cheapest repair is the one the
//! model never makes necessary. These suffixes steer the model away from the
//! malformations the passes exist to handle.

/// Formatting rules appended to JSON-mode prompts.
const JSON_SAFE_RULES: &str = r#"
CRITICAL FORMATTING RULES:
- Use only standard ASCII characters in JSON output
- Use straight quotes (") only, never smart quotes (" ")
- In descriptions, use apostrophes (') instead of quotes for dialogue
- Avoid special characters, unicode, or control characters
- Keep descriptions simple with basic punctuation only
- No quotation marks within string values
- No line breaks within string values - use spaces instead
- Example: "description": "A tavern where locals say its the best in town"

OUTPUT ONLY VALID JSON WITH NO ADDITIONAL TEXT OR COMMENTARY.
"#;

/// Guidelines appended to narrative-mode prompts.
const NARRATIVE_RULES: &str = r#"
FORMATTING GUIDELINES:
- Use clear, descriptive language
- Keep responses focused and immersive
- Use present tense for descriptions
- Avoid overly complex or flowery language
- Make descriptions practical and grounded
"#;

/// Appends the JSON-output formatting rules to a prompt.
pub fn json_safe_prompt(base: &str) -> String {
    format!("{base}\n{JSON_SAFE_RULES}")
}

/// Appends the narrative formatting guidelines to a prompt.
pub fn narrative_safe_prompt(base: &str) -> String {
    format!("{base}\n{NARRATIVE_RULES}")
}
