use std::sync::Arc;

use async_trait::async_trait;

use super::MessageProcessor;
use crate::error::{ProcessingError, Result};
use crate::lifecycle::{self, Lifecycle};
use crate::message::Message;

/// Ordered chain of processors
///
/// Each processor receives the previous one's output. The first failure stops
/// the chain and is returned as is.
pub struct Pipeline {
    name: String,
    processors: Vec<Arc<dyn MessageProcessor>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
        }
    }

    /// Append a processor
    pub fn push(&mut self, processor: Arc<dyn MessageProcessor>) {
        self.processors.push(processor);
    }

    /// Builder-style [`Pipeline::push`]
    pub fn with_processor(mut self, processor: Arc<dyn MessageProcessor>) -> Self {
        self.push(processor);
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn processors(&self) -> &[Arc<dyn MessageProcessor>] {
        &self.processors
    }

    fn members(&self) -> impl Iterator<Item = &dyn MessageProcessor> {
        self.processors.iter().map(|p| p.as_ref())
    }
}

impl Lifecycle for Pipeline {
    fn initialise(&self) -> Result<()> {
        lifecycle::run_all(self.members(), |p| p.initialise())
    }

    fn start(&self) -> Result<()> {
        lifecycle::run_all(self.members(), |p| p.start())
    }

    fn stop(&self) -> Result<()> {
        lifecycle::run_all(self.members(), |p| p.stop())
    }

    fn dispose(&self) -> Result<()> {
        lifecycle::dispose_all(&self.name, self.members());
        Ok(())
    }
}

#[async_trait]
impl MessageProcessor for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, message: Message) -> std::result::Result<Message, ProcessingError> {
        let mut current = message;
        for processor in &self.processors {
            current = processor.process(current).await?;
        }
        tracing::debug!(pipeline = %self.name, steps = self.processors.len(), "Pipeline completed");
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    struct Append(&'static str);

    impl Lifecycle for Append {}

    #[async_trait]
    impl MessageProcessor for Append {
        fn name(&self) -> &str {
            self.0
        }

        async fn process(&self, mut message: Message) -> std::result::Result<Message, ProcessingError> {
            let text = format!("{}{}", message.payload_as_string(), self.0);
            message.set_payload(text);
            Ok(message)
        }
    }

    struct Fail;

    impl Lifecycle for Fail {}

    #[async_trait]
    impl MessageProcessor for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        async fn process(&self, message: Message) -> std::result::Result<Message, ProcessingError> {
            Err(ProcessingError::new("fail", message, Error::NotRegistered("nothing".into())))
        }
    }

    #[tokio::test]
    async fn test_runs_in_order() {
        let pipeline = Pipeline::new("flow")
            .with_processor(Arc::new(Append("b")))
            .with_processor(Arc::new(Append("c")));

        let result = pipeline.process(Message::new("a")).await.unwrap();
        assert_eq!(result.payload(), &json!("abc"));
        assert_eq!(pipeline.len(), 2);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let pipeline = Pipeline::new("flow")
            .with_processor(Arc::new(Append("b")))
            .with_processor(Arc::new(Fail))
            .with_processor(Arc::new(Append("never")));

        let err = pipeline.process(Message::new("a")).await.unwrap_err();
        assert_eq!(err.operation, "fail");
        assert_eq!(err.message.payload(), &json!("ab"));
    }
}
