use crate::ai::{ChatMessage, ChatRequest};
use crate::config::ProviderOptions;

pub const SYSTEM_PROMPT: &str = concat!(
    "You are a professional AI translator specialized in precise, grammatically correct, ",
    "and context-aware localization of structured data such as JSON. ",
    "Translate only the text values into the target language, ensuring the result sounds ",
    "natural, clear, and idiomatic for native speakers. ",
    "Always use correct grammar, punctuation, and full word forms in the target language, ",
    "following official spelling conventions including diacritics where the language uses them. ",
    "Adapt phrasing to what is natural for the target language rather than translating word by word. ",
    "Keep a professional, human tone suitable for user interfaces, notifications, and documentation. ",
    "Do not translate or modify placeholders, variables, numbers, code fragments, HTML tags, or URLs. ",
    "Leave tokens of the form __P0__, __P1__ exactly as they are. ",
    "Preserve the exact JSON structure and return only the translated JSON object ",
    "with no explanations or extra text. ",
    "Prefer meanings appropriate for user interfaces, system messages, and software contexts."
);

pub fn user_prompt(source: &str, target: &str, payload: &str) -> String {
    format!(
        "Translate ALL values from {source} to {target}.\n\
         Keep placeholders ({{variable}}, [name], %s, etc.), HTML tags, and URLs unchanged.\n\
         Do NOT translate tokens like __P0__, __P1__, etc.\n\
         Return ONLY a valid JSON object with the same keys.\n\
         \n\
         JSON:\n\
         {payload}\n\
         \n\
         Translated JSON:\n"
    )
}

pub fn build_request(
    options: &ProviderOptions,
    source: &str,
    target: &str,
    payload: &str,
) -> ChatRequest {
    ChatRequest {
        model: options.model.clone(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(source, target, payload)),
        ],
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_names_languages_and_payload() {
        let prompt = user_prompt("English", "Romanian", "{\"a\": \"b\"}");

        assert!(prompt.starts_with("Translate ALL values from English to Romanian."));
        assert!(prompt.contains("({variable}, [name], %s, etc.)"));
        assert!(prompt.contains("JSON:\n{\"a\": \"b\"}\n\nTranslated JSON:"));
    }

    #[test]
    fn request_uses_provider_options() {
        let options = ProviderOptions::default();
        let request = build_request(&options, "English", "German", "{}");

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 2000);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
    }
}
