mod dispatcher;
mod signature;

pub use dispatcher::{DeliveryOutcome, RetryPolicy, WebhookDispatcher};
pub use signature::sign_payload;
