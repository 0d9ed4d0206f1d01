//! Publish options

use mesh_core::Context;

#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    /// Overrides the destination topic when non-empty
    pub exchange: Option<String>,
    /// Context handed to the broker for the publish itself
    pub context: Option<Context>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// The exchange, if set and non-empty
    pub fn effective_exchange(&self) -> Option<&str> {
        self.exchange.as_deref().filter(|e| !e.is_empty())
    }
}
