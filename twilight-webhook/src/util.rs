use twilight_http::request::channel::webhook::ExecuteWebhook;
use twilight_model::{
    channel::Channel,
    id::{marker::ChannelMarker, Id},
};

/// Returns the channel a webhook for `channel` has to be created in
///
/// Threads can't own webhooks, so the webhook goes to the thread's parent and
/// is executed with [`ExecuteWebhookExt::in_channel`]
#[must_use]
pub fn owner_channel_id(channel: &Channel) -> Id<ChannelMarker> {
    if channel.kind.is_thread() {
        channel.parent_id.unwrap_or(channel.id)
    } else {
        channel.id
    }
}

/// Utility functions to execute webhooks
pub trait ExecuteWebhookExt {
    /// If the channel is a thread channel, execute the webhook in it
    #[must_use]
    fn in_channel(self, channel: &Channel) -> Self;
}

impl ExecuteWebhookExt for ExecuteWebhook<'_> {
    fn in_channel(self, channel: &Channel) -> Self {
        if channel.kind.is_thread() {
            self.thread_id(channel.id)
        } else {
            self
        }
    }
}
