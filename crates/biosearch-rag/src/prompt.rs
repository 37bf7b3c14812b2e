//! Prompt templates for grounded answering and summarization.

/// System instruction for grounded question answering.
pub const ANSWER_SYSTEM: &str = "You are a research assistant for space biology literature. \
Answer using ONLY the numbered sources provided. Cite sources inline with bracketed numbers \
such as [1] or [2] that match the source numbering exactly. If the sources do not contain \
enough evidence to answer, say so plainly instead of guessing.";

/// System instruction for standalone summarization.
pub const SUMMARIZE_SYSTEM: &str = "You summarize scientific abstracts for researchers. \
Be concise, factual and faithful to the text. Never introduce claims the text does not make.";

/// Builds the user turn for a grounded answer: question first, then the
/// numbered context block, then the grounding rules. An optional style maps
/// to the same presets as summarization and shapes the answer's form.
pub fn answer_prompt(question: &str, context: &str, style: Option<&str>) -> String {
    let mut prompt = format!(
        "Question:\n{question}\n\nSources:\n{context}\n\
         Instructions:\n\
         - Open with a one-or-two sentence direct answer.\n\
         - Follow with the key findings, each backed by an inline citation like [1].\n\
         - Use only the sources above; do not cite numbers that are not listed."
    );
    if let Some(style) = style {
        prompt.push_str("\n- ");
        prompt.push_str(style_instruction(style));
    }
    prompt
}

/// Summarization style presets. Unknown styles fall back to `keypoints`.
pub fn style_instruction(style: &str) -> &'static str {
    match style {
        "abstract" => "Write a single condensed paragraph in the register of a journal abstract.",
        "methods" => "Summarize only the methods: model systems, conditions, durations, measurements.",
        "results" => "Summarize only the results: effects observed, directions, magnitudes.",
        "conclusion" => "Summarize only the conclusions and their implications.",
        _ => "Summarize as 3-5 short bullet points covering the key findings.",
    }
}

pub fn summarize_prompt(text: &str, style: &str) -> String {
    format!(
        "{}\n\nText:\n{text}",
        style_instruction(style)
    )
}
