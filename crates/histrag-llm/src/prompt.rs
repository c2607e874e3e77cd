/// What the model is told to say when the context does not answer the question.
pub const FALLBACK_ANSWER: &str = "Not enough information in the context.";

/// Grounded-answer prompt: persona, answering rules, then the context block and question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    persona: String,
}

impl PromptTemplate {
    pub fn new(persona: impl Into<String>) -> Self {
        Self { persona: persona.into() }
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        let persona = self.persona.trim();
        let mut prompt = String::with_capacity(512 + context.len() + question.len());
        if !persona.is_empty() {
            prompt.push_str(persona);
            prompt.push(' ');
        }
        prompt.push_str(
            "Using only the provided context, answer the user's question in a single, clear, and accurate sentence. \
             Your answer must include both the date and the significance of the event, and should be concise and self-contained. \
             Do not add any information that is not in the context. ",
        );
        prompt.push_str(&format!("If the context is insufficient, say '{FALLBACK_ANSWER}'\n\n"));
        prompt.push_str(&format!("Context:\n{context}\n\nQuestion: {question}\nAnswer:"));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rules_context_and_question_in_order() {
        let t = PromptTemplate::new("You are a helpful Philippine history expert.");
        let p = t.render("- \"Rizal was born in 1861.\"", "When was Rizal born?");
        assert!(p.starts_with("You are a helpful Philippine history expert. Using only the provided context"));
        assert!(p.contains("both the date and the significance of the event"));
        assert!(p.contains("Do not add any information that is not in the context."));
        assert!(p.contains("say 'Not enough information in the context.'"));
        assert!(p.ends_with("Context:\n- \"Rizal was born in 1861.\"\n\nQuestion: When was Rizal born?\nAnswer:"));
    }

    #[test]
    fn empty_persona_is_skipped() {
        let p = PromptTemplate::new("  ").render("", "q");
        assert!(p.starts_with("Using only the provided context"));
        assert!(p.contains("Context:\n\n\nQuestion: q"));
    }
}
