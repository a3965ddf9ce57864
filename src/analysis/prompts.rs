//! Prompt templates for the analysis pipeline, document chat, and roadmap
//! generation. Document content is truncated before interpolation so prompts
//! stay inside the model context.

/// Maximum document characters interpolated into an analysis prompt.
const MAX_PROMPT_CONTENT_CHARS: usize = 4_000;

/// Truncate on a UTF-8 char boundary at or below the limit.
fn truncate_content(content: &str) -> &str {
    if content.len() <= MAX_PROMPT_CONTENT_CHARS {
        return content;
    }
    let mut end = MAX_PROMPT_CONTENT_CHARS;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

pub fn summary_prompt(content: &str) -> String {
    format!(
        "Summarize the following study material in 3-5 sentences. Focus on the \
         main ideas a student should retain.\n\n\
         Respond with JSON: {{\"summary\": \"...\"}}\n\n\
         Material:\n{}",
        truncate_content(content)
    )
}

pub fn key_points_prompt(content: &str) -> String {
    format!(
        "Extract the 5-7 most important points from the following study \
         material. Each point should be one concise sentence.\n\n\
         Respond with JSON: {{\"key_points\": [\"...\", \"...\"]}}\n\n\
         Material:\n{}",
        truncate_content(content)
    )
}

pub fn qa_cards_prompt(content: &str, summary: &str) -> String {
    format!(
        "Create 5 question-and-answer study cards from the following material. \
         Questions should test understanding, not trivia.\n\n\
         Respond with a JSON array: \
         [{{\"question\": \"...\", \"answer\": \"...\"}}]\n\n\
         Summary of the material: {summary}\n\n\
         Material:\n{}",
        truncate_content(content)
    )
}

/// System prompt for document chat, grounding the model in retrieved chunks.
pub fn chat_system_prompt(document_name: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n\n---\n\n");
    format!(
        "You are a study assistant helping a student understand the document \
         \"{document_name}\". Answer using only the excerpts below. If the \
         excerpts do not contain the answer, say so rather than guessing.\n\n\
         Excerpts:\n{context}"
    )
}

/// Fallback system prompt when retrieval finds no relevant chunks.
pub fn chat_fallback_prompt(document_name: &str, summary: &str) -> String {
    format!(
        "You are a study assistant helping a student understand the document \
         \"{document_name}\". No passage in the document matched the question \
         directly, so answer from this summary and say when the document does \
         not cover something.\n\n\
         Summary:\n{summary}"
    )
}

/// Prompt for roadmap generation. Demands strict JSON matching the roadmap
/// schema; the caller parses and rejects anything else.
pub fn roadmap_prompt(
    goal: &str,
    experience_level: &str,
    timeline: &str,
    specific_goals: &[String],
    context_chunks: &[String],
) -> String {
    let goals_line = if specific_goals.is_empty() {
        String::from("none stated")
    } else {
        specific_goals.join("; ")
    };
    let context = if context_chunks.is_empty() {
        String::from("(no reference material available)")
    } else {
        context_chunks.join("\n\n---\n\n")
    };

    format!(
        "Create a personalized learning roadmap.\n\n\
         Learning goal: {goal}\n\
         Experience level: {experience_level}\n\
         Timeline: {timeline}\n\
         Specific goals: {goals_line}\n\n\
         Reference material for grounding step content:\n{context}\n\n\
         Respond with ONLY a JSON object, no prose, in exactly this shape:\n\
         {{\n\
           \"steps\": [\n\
             {{\n\
               \"name\": \"Step title\",\n\
               \"description\": \"What to learn and why, 2-3 sentences\",\n\
               \"estimated_time\": \"e.g. 1 week\",\n\
               \"resources\": [\n\
                 {{\"name\": \"Resource name\", \"url\": \"https://...\", \"description\": \"why it helps\"}}\n\
               ]\n\
             }}\n\
           ]\n\
         }}\n\
         Produce 4-8 ordered steps sized to the timeline."
    )
}
