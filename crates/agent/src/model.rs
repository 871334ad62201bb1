//! One cancellable model round-trip.

use crate::cancel::{self, Cancelled};
use actloop_core::error::ProviderError;
use actloop_core::message::Message;
use actloop_core::provider::{Provider, ProviderRequest};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A provider bound to a model name and sampling settings for one turn.
#[derive(Clone, Copy)]
pub struct ModelClient<'a> {
    provider: &'a dyn Provider,
    model: &'a str,
    temperature: Option<f32>,
}

impl<'a> ModelClient<'a> {
    pub fn new(provider: &'a dyn Provider, model: &'a str, temperature: Option<f32>) -> Self {
        Self {
            provider,
            model,
            temperature,
        }
    }

    /// Send `messages` and return the reply text.
    ///
    /// The outer `Result` is cancellation; the inner one is the request.
    pub async fn ask(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<Result<String, ProviderError>, Cancelled> {
        debug!(model = self.model, messages = messages.len(), "Requesting completion");
        let request = ProviderRequest::new(self.model, messages).with_temperature(self.temperature);
        let response = cancel::race(cancel, self.provider.complete(request)).await?;
        Ok(response.map(|r| r.message.content))
    }
}
