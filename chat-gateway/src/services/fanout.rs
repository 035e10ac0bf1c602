use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use super::metrics::record_fanout;
use super::providers::{PushMessage, PushProvider, PushTarget};
use super::store::{StoreError, Stores};
use crate::models::Message;

/// The part of a push that is the same for every recipient.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub data: HashMap<String, String>,
}

impl NotificationTemplate {
    /// Notification announcing a new group message.
    pub fn for_group_message(message: &Message, icon: Option<String>) -> Self {
        let mut data = HashMap::new();
        data.insert("message_id".to_string(), message.id.to_string());
        data.insert("sender".to_string(), message.sender.clone());
        if let Some(group_id) = &message.group_id {
            data.insert("group_id".to_string(), group_id.clone());
        }

        Self {
            title: format!("New message from {}", message.sender),
            body: message.message.clone(),
            icon,
            data,
        }
    }

    fn addressed_to(&self, token: String) -> PushMessage {
        PushMessage {
            to: PushTarget::Token(token),
            title: self.title.clone(),
            body: self.body.clone(),
            icon: self.icon.clone(),
            data: self.data.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Push `template` to every distinct token, at most `concurrency` at a time.
///
/// Waits for every send. A failed send is logged and counted; it never
/// aborts the others or becomes an error for the caller.
pub async fn fan_out<I>(
    provider: &dyn PushProvider,
    tokens: I,
    template: &NotificationTemplate,
    concurrency: usize,
) -> FanOutReport
where
    I: IntoIterator<Item = String>,
{
    let distinct: BTreeSet<String> = tokens.into_iter().filter(|t| !t.is_empty()).collect();
    let mut report = FanOutReport {
        attempted: distinct.len(),
        ..FanOutReport::default()
    };

    let results: Vec<_> = stream::iter(distinct)
        .map(|token| async move {
            let push = template.addressed_to(token.clone());
            (token, provider.send(&push).await)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (token, result) in results {
        match result {
            Ok(_) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(token = %token, error = %e, "Push notification failed");
            }
        }
    }

    record_fanout(&report);
    report
}

/// Notify every member of `group_id` who has a registered device token.
pub async fn notify_group(
    stores: &Stores,
    provider: &dyn PushProvider,
    group_id: &str,
    message: &Message,
    icon: Option<String>,
    concurrency: usize,
) -> Result<FanOutReport, StoreError> {
    let members = stores.groups.member_ids(group_id).await?;
    let tokens = stores.tokens.tokens_for(&members).await?;

    let template = NotificationTemplate::for_group_message(message, icon);
    let report = fan_out(
        provider,
        tokens.into_iter().map(|t| t.token),
        &template,
        concurrency,
    )
    .await;

    tracing::info!(
        group_id = %group_id,
        members = members.len(),
        attempted = report.attempted,
        delivered = report.delivered,
        failed = report.failed,
        "Group notification fan-out finished"
    );
    Ok(report)
}
