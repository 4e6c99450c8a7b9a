//! Conversational answering over retrieved context.
//!
//! [`ChatPipeline`] holds rolling conversation memory and answers each
//! question by retrieving fused context, replaying the prior turns, and
//! asking the synthesizer for a completion. Synthesis failures never
//! propagate: the caller gets a fixed fallback string and the memory keeps
//! only successful turns.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::llm::{AnswerSynthesizer, ChatMessage};
use crate::retrieve::HybridRetriever;

const SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions \
about an internal knowledge base. Use the provided documents to answer as \
accurately as possible, and maintain context across the conversation.";

const FALLBACK_ANSWER: &str = "Sorry, an error occurred while generating the response.";

/// One completed question/answer exchange.
#[derive(Debug, Clone)]
struct Turn {
    question: String,
    answer: String,
}

pub struct ChatPipeline {
    retriever: HybridRetriever,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    memory: Mutex<Vec<Turn>>,
}

impl ChatPipeline {
    pub fn new(retriever: HybridRetriever, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self {
            retriever,
            synthesizer,
            memory: Mutex::new(Vec::new()),
        }
    }

    /// Answer one question. Always returns a string; a synthesis failure is
    /// logged and replaced with the fallback answer.
    pub async fn answer(&self, question: &str) -> String {
        let items = self.retriever.retrieve(question).await;
        debug!(items = items.len(), "assembled context");

        let context = items
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        {
            let memory = self.memory.lock().await;
            for turn in memory.iter() {
                messages.push(ChatMessage::user(turn.question.clone()));
                messages.push(ChatMessage::assistant(turn.answer.clone()));
            }
        }
        messages.push(ChatMessage::user(format!(
            "{}\n\nHere are some relevant docs:\n{}",
            question, context
        )));

        match self.synthesizer.complete(&messages).await {
            Ok(answer) => {
                info!("answer generated");
                let mut memory = self.memory.lock().await;
                memory.push(Turn {
                    question: question.to_string(),
                    answer: answer.clone(),
                });
                answer
            }
            Err(e) => {
                error!(error = format!("{e:#}"), "answer synthesis failed");
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}
