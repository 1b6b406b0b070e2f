//! Event bus port — publish/subscribe for fleet events.

use std::future::Future;

use fleethub_domain::error::FleetError;
use fleethub_domain::event::Event;

/// Publishes fleet events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FleetError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FleetError>> + Send {
        (**self).publish(event)
    }
}
