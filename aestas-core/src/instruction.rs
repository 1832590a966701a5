// ABOUTME: System instruction pipeline - ordered stages over a text buffer
// ABOUTME: Stages run in registration order and stop at the first error

use crate::bot::Bot;
use crate::error::BotError;

/// One stage: appends to or rewrites the buffer, or fails with a message
pub type InstructionStage = Box<dyn Fn(&Bot, &mut String) -> Result<(), String> + Send + Sync>;

/// Builds the system prompt a model sees for a bot
#[derive(Default)]
pub struct InstructionPipeline {
    stages: Vec<InstructionStage>,
}

impl InstructionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn then<F>(mut self, stage: F) -> Self
    where
        F: Fn(&Bot, &mut String) -> Result<(), String> + Send + Sync + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a stage that adds a fixed line of text
    pub fn line(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.then(move |_, buf| {
            push_line(buf, &text);
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over an empty buffer
    pub fn run(&self, bot: &Bot) -> Result<String, BotError> {
        let mut buf = String::new();
        for (stage, f) in self.stages.iter().enumerate() {
            f(bot, &mut buf).map_err(|message| BotError::Instruction { stage, message })?;
        }
        Ok(buf)
    }
}

/// Append `text` on its own line
pub fn push_line(buf: &mut String, text: &str) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(text);
}

impl std::fmt::Debug for InstructionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionPipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}
