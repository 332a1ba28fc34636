//! Prompt construction for the answer and recommendation pipelines.
//!
//! Both builders are pure: the same inputs always produce the same prompt.
//! Document text is cut to a fixed character budget so prompt size (and so
//! latency and cost) stays bounded regardless of document length; the
//! question itself is never truncated.

/// Characters of document text included in an answer prompt.
pub const ANSWER_CONTEXT_CHARS: usize = 2000;

/// Characters of document text sampled for question recommendations.
pub const RECOMMENDATION_SAMPLE_CHARS: usize = 1000;

/// Marker appended to an excerpt that was cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was dropped.
///
/// Counts `char`s rather than bytes, so multi-byte text is never split mid-character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Build the prompt asking the model to answer `question` from `document_text`.
pub fn build_answer_prompt(document_text: &str, question: &str) -> String {
    let excerpt = truncate_chars(document_text, ANSWER_CONTEXT_CHARS);
    format!(
        "You are answering questions about a document. Answer strictly based on the \
         document excerpt below. If the excerpt does not contain the answer, say so \
         and set canAnswer to false.\n\
         \n\
         Document excerpt:\n\
         \"\"\"\n\
         {excerpt}\n\
         \"\"\"\n\
         \n\
         Question: {question}\n\
         \n\
         Respond with a single JSON object containing exactly these fields and nothing else:\n\
         {{\n  \
           \"answer\": \"<your answer>\",\n  \
           \"canAnswer\": <true or false>,\n  \
           \"confidence\": <number between 0.0 and 1.0>,\n  \
           \"reasoning\": \"<one sentence explaining how the excerpt supports the answer>\"\n\
         }}"
    )
}

/// Build the prompt asking the model for three questions worth asking about the document.
pub fn build_recommendation_prompt(document_text: &str) -> String {
    let sample = truncate_chars(document_text, RECOMMENDATION_SAMPLE_CHARS);
    format!(
        "Read the following document sample and suggest exactly three short, specific \
         questions a reader could ask about it. Each question must be answerable from \
         the document.\n\
         \n\
         Document sample:\n\
         \"\"\"\n\
         {sample}\n\
         \"\"\"\n\
         \n\
         Respond with a single JSON object holding exactly three strings under \"questions\" \
         and nothing else, for example:\n\
         {{\"questions\": [\"First question?\", \"Second question?\", \"Third question?\"]}}"
    )
}
