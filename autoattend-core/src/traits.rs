//! Core trait definitions

use crate::types::ChatId;
use async_trait::async_trait;
use std::sync::Arc;

/// One-way text delivery to a chat identity
///
/// Delivery is best effort: implementations log failures and never return
/// them, so callers cannot depend on a message having arrived.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &ChatId, text: &str);
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify(&self, target: &ChatId, text: &str) {
        (**self).notify(target, text).await
    }
}
