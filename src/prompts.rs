//! Default prompt templates and the named-placeholder renderer.
//!
//! Templates use `{name}` placeholders. Rendering substitutes every supplied
//! variable and fails with [`TemplateError`] when an unresolved placeholder
//! remains, so callers can degrade to a minimal fallback prompt instead of
//! sending a half-rendered template to a model.

use regex::Regex;
use thiserror::Error;

/// Default Stage 1 prompt. `{search_context_block}` is empty when no search
/// was performed.
pub const STAGE1_PROMPT_DEFAULT: &str = "You are a helpful AI assistant.
{search_context_block}
Question: {user_query}";

/// Preamble wrapped around search results before they enter Stage 1.
pub const STAGE1_SEARCH_CONTEXT_TEMPLATE: &str = "You have access to the following real-time web search results.
You MUST use this information to answer the question, even if it contradicts your internal knowledge cutoff.
Do not say \"I cannot access real-time information\" or \"My knowledge is limited to...\" because you have the search results right here.

Search Results:
{search_context}
";

/// Default Stage 2 ranking prompt. The FINAL RANKING format it mandates is
/// what [`crate::ranking::parse_ranking`] expects.
pub const STAGE2_PROMPT_DEFAULT: &str = "You are evaluating different responses to the following question:

Question: {user_query}

{search_context_block}
Here are the responses from different models (anonymized):

{responses_text}

Your task:
1. First, evaluate each response individually. For each response, explain what it does well and what it does poorly.
2. Then, at the very end of your response, provide a final ranking.

IMPORTANT: Your final ranking MUST be formatted EXACTLY as follows:
- Start with the line \"FINAL RANKING:\" (all caps, with colon)
- Then list the responses from best to worst as a numbered list
- Each line should be: number, period, space, then ONLY the response label (e.g., \"1. Response A\")
- Do not add any other text or explanations in the ranking section

Example of the correct format for your ENTIRE response:

Response A provides good detail on X but misses Y...
Response B is accurate but lacks depth on Z...
Response C offers the most comprehensive answer...

FINAL RANKING:
1. Response C
2. Response A
3. Response B

Now provide your evaluation and ranking:";

/// Default Stage 3 chairman synthesis prompt.
pub const STAGE3_PROMPT_DEFAULT: &str = "You are the Chairman of an LLM Council. Multiple AI models have provided responses to a user's question, and then ranked each other's responses.

Original Question: {user_query}

{search_context_block}
STAGE 1 - Individual Responses:
{stage1_text}

STAGE 2 - Peer Rankings:
{stage2_text}

Your task as Chairman is to synthesize all of this information into a single, comprehensive, accurate answer to the user's original question. Consider:
- The individual responses and their insights
- The peer rankings and what they reveal about response quality
- Any patterns of agreement or disagreement

Provide a clear, well-reasoned final answer that represents the council's collective wisdom:";

/// Default prompt asking the search-query model to extract search terms.
pub const SEARCH_QUERY_PROMPT_DEFAULT: &str = "Extract the key search terms from this question for a web search.
Return ONLY the search terms (3-6 words), no explanation or formatting.
Focus on the main topic, entities, and time-relevant terms.
Remove question words and verbs like \"analyze\", \"explain\", \"describe\".

Question: {user_query}

Search terms:";

/// Error type for template rendering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template references a placeholder the caller did not supply.
    #[error("template placeholder {{{name}}} was not supplied")]
    MissingPlaceholder {
        /// Placeholder name as written in the template.
        name: String,
    },
}

/// Render a template by substituting `{name}` placeholders.
///
/// # Errors
///
/// Returns [`TemplateError::MissingPlaceholder`] when the template still
/// contains a `{name}` placeholder after all supplied variables were
/// substituted.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let Ok(placeholder) = Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}") else {
        return Ok(template.to_owned());
    };

    for captures in placeholder.captures_iter(template) {
        if let Some(name) = captures.get(1) {
            if !vars.iter().any(|(key, _)| *key == name.as_str()) {
                return Err(TemplateError::MissingPlaceholder {
                    name: name.as_str().to_owned(),
                });
            }
        }
    }

    // Single pass, so substituted values are never re-scanned.
    let rendered = placeholder.replace_all(template, |captures: &regex::Captures<'_>| {
        let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| (*value).to_owned())
            .unwrap_or_default()
    });

    Ok(rendered.into_owned())
}
