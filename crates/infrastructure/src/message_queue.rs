use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    acker::Acker, options::*, types::FieldTable, BasicProperties, Channel, Connection,
    ConnectionProperties, Consumer,
};
use sentinel_core::{
    config::models::MessageQueueConfig,
    traits::{TaskDelivery, TaskDeliveryStream, TaskQueue},
    SentinelError, SentinelResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::bootstrap::connect_with_retry;

/// RabbitMQ任务队列实现
pub struct RabbitMQTaskQueue {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    config: MessageQueueConfig,
}

impl RabbitMQTaskQueue {
    /// 连接RabbitMQ并声明持久化任务队列，启动阶段按配置有限次重试
    pub async fn new(config: MessageQueueConfig) -> SentinelResult<Self> {
        let connection = connect_with_retry(
            "RabbitMQ",
            config.connect_attempts,
            Duration::from_secs(config.connect_retry_delay_seconds),
            || async {
                Connection::connect(&config.url, ConnectionProperties::default())
                    .await
                    .map_err(|e| SentinelError::MessageQueue(format!("连接RabbitMQ失败: {e}")))
            },
        )
        .await?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            config,
        };

        {
            let channel = queue.channel.lock().await;
            queue.declare_queue(&channel).await?;
        }

        Ok(queue)
    }

    async fn declare_queue(&self, channel: &Channel) -> SentinelResult<()> {
        let queue_name = &self.config.task_queue;
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                SentinelError::MessageQueue(format!("声明队列 {queue_name} 失败: {e}"))
            })?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(())
    }

    pub fn queue_name(&self) -> &str {
        &self.config.task_queue
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }
}

#[async_trait]
impl TaskQueue for RabbitMQTaskQueue {
    async fn publish_task(&self, task_id: i64) -> SentinelResult<()> {
        let channel = self.channel.lock().await;
        let payload = task_id.to_string();

        let confirm = channel
            .basic_publish(
                "",
                &self.config.task_queue,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                BasicProperties::default().with_delivery_mode(2), // 2 = persistent
            )
            .await
            .map_err(|e| {
                SentinelError::MessageQueue(format!(
                    "发布消息到队列 {} 失败: {e}",
                    self.config.task_queue
                ))
            })?;

        confirm
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        debug!("任务 {} 已发布到队列: {}", task_id, self.config.task_queue);
        Ok(())
    }

    async fn subscribe(&self, prefetch: u16) -> SentinelResult<Box<dyn TaskDeliveryStream>> {
        // QoS is per channel, so each consumer gets its own.
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("创建消费通道失败: {e}")))?;

        self.declare_queue(&channel).await?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("设置QoS失败: {e}")))?;

        let consumer = channel
            .basic_consume(
                &self.config.task_queue,
                "sentinel-scan-worker",
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("创建消费者失败: {e}")))?;

        info!(
            "开始消费队列 {} (prefetch={})",
            self.config.task_queue, prefetch
        );

        Ok(Box::new(RabbitMQDeliveryStream {
            _channel: channel,
            consumer,
        }))
    }

    async fn close(&self) -> SentinelResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

struct RabbitMQDeliveryStream {
    _channel: Channel,
    consumer: Consumer,
}

#[async_trait]
impl TaskDeliveryStream for RabbitMQDeliveryStream {
    async fn next_delivery(&mut self) -> Option<SentinelResult<Box<dyn TaskDelivery>>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| {
                    Box::new(RabbitMQDelivery {
                        body: delivery.data,
                        redelivered: delivery.redelivered,
                        acker: delivery.acker,
                    }) as Box<dyn TaskDelivery>
                })
                .map_err(|e| SentinelError::MessageQueue(format!("接收消息失败: {e}"))),
        )
    }
}

struct RabbitMQDelivery {
    body: Vec<u8>,
    redelivered: bool,
    acker: Acker,
}

#[async_trait]
impl TaskDelivery for RabbitMQDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(&self) -> SentinelResult<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("确认消息失败: {e}")))
            .map(|_| ())
    }

    async fn reject(&self, requeue: bool) -> SentinelResult<()> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map_err(|e| SentinelError::MessageQueue(format!("拒绝消息失败: {e}")))
            .map(|_| ())
    }
}
