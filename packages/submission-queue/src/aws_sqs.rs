//! `AwsSqsTransport`: the only [`QueueTransport`] implementation shipped
//! here, backed by `aws-sdk-sqs`. Translates
//! `original_source/backend/orchestration/subscriber.py` and
//! `dlq_monitor.py`'s boto3 calls one-for-one.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_sqs::types::{MessageAttributeValue, MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;

use crate::transport::{QueueDepth, QueueError, QueueTransport, RawMessage};

pub struct AwsSqsTransport {
    client: Client,
}

impl AwsSqsTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the default AWS config chain (env vars, shared
    /// config/credentials files, IMDS).
    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl QueueTransport for AwsSqsTransport {
    async fn receive(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_seconds: i32,
        visibility_timeout_seconds: i32,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .visibility_timeout(visibility_timeout_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        Ok(output
            .messages()
            .iter()
            .filter_map(raw_message_from_sdk)
            .collect())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String, QueueError> {
        let mut request = self.client.send_message().queue_url(queue_url).message_body(body);

        for (name, value) in attributes {
            request = request.message_attributes(
                name,
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(value)
                    .build()
                    .map_err(|e| QueueError::Transport(e.to_string()))?,
            );
        }

        let output = request.send().await.map_err(|e| QueueError::Transport(e.to_string()))?;

        output
            .message_id()
            .map(str::to_string)
            .ok_or_else(|| QueueError::Transport("queue did not return a MessageId".to_string()))
    }

    async fn peek(&self, queue_url: &str, max_messages: i32) -> Result<Vec<RawMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages.min(10))
            .wait_time_seconds(0)
            .visibility_timeout(30)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let messages: Vec<RawMessage> = output
            .messages()
            .iter()
            .filter_map(raw_message_from_sdk)
            .collect();

        // We're just peeking: reset visibility immediately so the messages
        // stay available for the next real consumer.
        for message in &messages {
            if let Err(e) = self
                .client
                .change_message_visibility()
                .queue_url(queue_url)
                .receipt_handle(&message.receipt_handle)
                .visibility_timeout(0)
                .send()
                .await
            {
                tracing::warn!(error = %e, "failed to reset visibility after DLQ peek");
            }
        }

        Ok(messages)
    }

    async fn depth(&self, queue_url: &str) -> Result<QueueDepth, QueueError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let attrs = output.attributes();
        let visible = attrs
            .and_then(|a| a.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let in_flight = attrs
            .and_then(|a| a.get(&QueueAttributeName::ApproximateNumberOfMessagesNotVisible))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(QueueDepth { visible, in_flight })
    }
}

fn raw_message_from_sdk(message: &aws_sdk_sqs::types::Message) -> Option<RawMessage> {
    let message_id = message.message_id()?.to_string();
    let receipt_handle = message.receipt_handle()?.to_string();
    let body = message.body().unwrap_or_default().to_string();
    let approximate_receive_count = message
        .attributes()
        .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    Some(RawMessage {
        message_id,
        receipt_handle,
        body,
        approximate_receive_count,
    })
}
