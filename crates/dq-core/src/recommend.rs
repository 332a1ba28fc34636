use tracing::{debug, warn};

use crate::model_client::{Invocation, ModelClient};
use crate::parser::parse_question_list;
use crate::prompt::build_recommendation_prompt;

/// Number of questions a recommendation returns at most.
pub const MAX_RECOMMENDATIONS: usize = 3;

/// Returned whenever the model cannot supply usable suggestions.
pub const FALLBACK_QUESTIONS: [&str; MAX_RECOMMENDATIONS] = [
    "What is the main topic of this document?",
    "What are the key points discussed in this document?",
    "What conclusions can be drawn from this document?",
];

pub fn fallback_questions() -> Vec<String> {
    FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Suggests questions worth asking about a document. Advisory only, so it
/// never fails: any problem yields [`FALLBACK_QUESTIONS`].
pub struct RecommendationGenerator {
    client: ModelClient,
}

impl RecommendationGenerator {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    pub async fn generate(&self, document_text: &str) -> Vec<String> {
        if document_text.trim().is_empty() {
            debug!("No document text to sample, using fallback questions");
            return fallback_questions();
        }

        let prompt = build_recommendation_prompt(document_text);
        match self.client.invoke(&prompt).await {
            Ok(Invocation::Generated { text, .. }) => {
                let questions = parse_question_list(&text, MAX_RECOMMENDATIONS);
                if questions.is_empty() {
                    warn!(output_len = text.len(), "Unusable recommendation output, using fallback questions");
                    fallback_questions()
                } else {
                    questions
                }
            }
            Ok(Invocation::Degraded { attempts, .. }) => {
                warn!(attempts, "Provider overloaded, using fallback questions");
                fallback_questions()
            }
            Err(e) => {
                warn!(error = %e, "Recommendation failed, using fallback questions");
                fallback_questions()
            }
        }
    }
}
