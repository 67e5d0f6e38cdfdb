use std::sync::Arc;
use tracing::{error, info, warn};

use crate::llm::{ChatMessage, CompletionClient, Role};
use crate::retriever::{DEFAULT_TOP_K, Retriever};

pub const FALLBACK_REPLY: &str =
    "The AI diagnostic engine is temporarily unavailable. Please retry.";

pub const SYSTEM_PROMPT: &str = r#"
You are an industrial intelligence assistant.

You support plant engineers in monitoring and troubleshooting industrial vacuum pumps used in pharmaceutical manufacturing environments.

Your responsibilities:

1. Provide clear, structured, and technically accurate responses.
2. Focus on vacuum pump performance monitoring, fault diagnosis, and maintenance guidance.
3. Use professional engineering language suitable for plant engineers.
4. Prioritize safety, compliance, and operational reliability.
5. Avoid speculation. If insufficient data is provided, ask for relevant parameters.

Relevant Monitoring Parameters:
- Current vacuum value achieved
- Setpoint vacuum value
- Power load
- Running hours
- Time taken to reach setpoint
- Oil level condition

Common Vacuum Pump Issues:
- Not achieving vacuum set point
- Pump overheating or overload
- Pump not running
- Excessive power consumption
- Oil contamination or low oil level

When diagnosing:
- Suggest possible root causes
- Suggest inspection steps
- Suggest corrective actions
- Keep answers structured using bullet points when appropriate
- Avoid unnecessary verbosity

Do NOT provide medical advice.
Do NOT answer unrelated general knowledge questions.
If the question is outside vacuum pump monitoring or industrial equipment, respond that the system is restricted to industrial vacuum pump diagnostics.

Maintain a professional and concise tone at all times.

Respond using structured Markdown. Use the following structure when applicable:

### Possible Causes
- Cause 1
- Cause 2

### Recommended Inspection Steps
- Step 1
- Step 2

### Corrective Actions
- Action 1
- Action 2

Do not use asterisk-based bullet formatting. Use dashes (-) for bullets.
"#;

/// Guided prompts offered to users who prefer picking a symptom over typing one.
pub const QUICK_OPTIONS: &[&str] = &[
    "Pump is not achieving the vacuum setpoint",
    "Pump is overheating or tripping on overload",
    "Pump is not running",
    "Power consumption is higher than normal",
    "Oil looks contaminated or the oil level is low",
    "Pump takes too long to reach the setpoint",
];

const KNOWLEDGE_HEADER: &str = "\n\nRelevant Knowledge from Database:\n";

/// Answers user messages with retrieved knowledge and a completion service.
pub struct ChatService<C> {
    retriever: Arc<Retriever>,
    client: C,
    top_k: usize,
}

impl<C: CompletionClient> ChatService<C> {
    pub fn new(retriever: Arc<Retriever>, client: C) -> Self {
        Self {
            retriever,
            client,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Builds the full message list sent to the completion service.
    pub fn build_messages(&self, message: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let context = self.retriever.retrieve(message, self.top_k);

        let mut system = SYSTEM_PROMPT.to_string();
        if !context.is_empty() {
            system.push_str(KNOWLEDGE_HEADER);
            system.push_str(&context.join("\n\n"));
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        for past in history {
            // only user turns keep their role; everything else replays as assistant
            let role = if past.role == Role::User { Role::User } else { Role::Assistant };
            messages.push(ChatMessage {
                role,
                content: past.content.clone(),
            });
        }
        messages.push(ChatMessage::user(message));
        messages
    }

    /// Never fails: any problem is logged and answered with [`FALLBACK_REPLY`].
    pub async fn reply(&self, message: &str, history: &[ChatMessage]) -> String {
        if message.trim().is_empty() {
            warn!("Empty message received");
            return FALLBACK_REPLY.to_string();
        }

        info!("Incoming message: {}", message);
        let messages = self.build_messages(message, history);

        match self.client.complete(&messages).await {
            Ok(reply) => {
                info!("Completion received, length: {}", reply.len());
                reply
            }
            Err(e) => {
                error!("Completion service error: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// In-memory history of one chat session.
#[derive(Debug, Default)]
pub struct Conversation {
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn record(&mut self, user: &str, assistant: &str) {
        self.history.push(ChatMessage::user(user));
        self.history.push(ChatMessage::assistant(assistant));
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Sends `message` with the current history and records the exchange.
    pub async fn ask<C: CompletionClient>(&mut self, service: &ChatService<C>, message: &str) -> String {
        let reply = service.reply(message, &self.history).await;
        self.record(message, &reply);
        reply
    }
}
