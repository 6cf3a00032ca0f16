//! Instruction and request body for structured document insights.

use serde::Serialize;

/// System instruction enforcing the four-key JSON contract.
pub(crate) const SYSTEM_PROMPT: &str = "You are an assistant processing business documents. \
Analyze the provided text and return a single valid JSON object with exactly these keys:\n\
- \"summary\": a two-sentence summary of the document.\n\
- \"documentType\": the type of document (for example Invoice, RFP, Contract, Memo).\n\
- \"keyEntities\": an array of strings naming the main companies, people, or products.\n\
- \"actionItems\": an array of strings listing next steps or deadlines mentioned.\n\
Return pure JSON. Do not wrap it in markdown fences and do not add any other prose.";

/// Sampling temperature for analysis requests.
pub(crate) const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub(crate) messages: [ChatMessage<'a>; 2],
    pub(crate) temperature: f32,
    pub(crate) response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
}

/// Assemble the chat request for the given (already bounded) document text.
pub(crate) fn build_request(text: &str) -> ChatRequest<'_> {
    ChatRequest {
        messages: [
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: text,
            },
        ],
        temperature: TEMPERATURE,
        response_format: ResponseFormat {
            kind: "json_object",
        },
    }
}
