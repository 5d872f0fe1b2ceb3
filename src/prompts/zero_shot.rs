//! Zero-shot scoring prompts for publication categorization.
//!
//! Contains system and user prompt templates used when a chat model stands
//! in for a dedicated zero-shot classifier.

/// System prompt for multi-label publication scoring
pub const SYSTEM_PROMPT: &str = r#"You are an academic publication classifier. For each candidate category you judge, independently of the other categories, how likely it is that the given statement holds for the paper described in the input text.

Rules you MUST follow:
- Base your judgment ONLY on the provided text (title, venue, abstract excerpt).
- Score every candidate category exactly once, using the category name verbatim.
- Scores are independent probabilities between 0.0 and 1.0; they do NOT need to sum to 1.
- Several categories may apply at once; none may apply.
- Output MUST be valid JSON only (no extra text), for machine parsing.

Output format (strict JSON, no markdown):
{
  "scores": {"<category>": 0.0-1.0, ...}
}"#;

/// User prompt template for a single text
/// Placeholders: {hypotheses}, {paper_text}
pub const USER_PROMPT_TEMPLATE: &str = r#"Score each statement for the paper below.

Statements (one per candidate category):
{hypotheses}

Paper text:
{paper_text}

Output strict JSON only (no markdown code blocks, no extra text):
{
  "scores": {"<category>": 0.0-1.0, ...}
}"#;

/// Render one hypothesis line per label: `- <label>: <hypothesis>`.
pub fn build_hypotheses(labels: &[String], hypothesis_template: &str) -> String {
    labels
        .iter()
        .map(|label| format!("- {}: {}", label, hypothesis_template.replace("{}", label)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build user prompt for one paper text
pub fn build_user_prompt(labels: &[String], hypothesis_template: &str, paper_text: &str) -> String {
    USER_PROMPT_TEMPLATE
        .replace("{hypotheses}", &build_hypotheses(labels, hypothesis_template))
        .replace("{paper_text}", paper_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_prompt() {
        let labels = vec!["Photonics".to_string(), "Quantum Simulation".to_string()];
        let prompt = build_user_prompt(&labels, "This paper is about {}.", "Hubbard model on a chip");
        assert!(prompt.contains("- Photonics: This paper is about Photonics."));
        assert!(prompt.contains("- Quantum Simulation: This paper is about Quantum Simulation."));
        assert!(prompt.contains("Hubbard model on a chip"));
        assert!(!prompt.contains("{hypotheses}"));
    }
}
