use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, error, info};

use crate::config::KafkaConfig;
use crate::event::CustomerEvent;
use crate::sinks::EventSink;

pub struct KafkaContext {}

impl rdkafka::ClientContext for KafkaContext {}

#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaSink {
    pub fn new(config: KafkaConfig) -> Result<KafkaSink> {
        info!("connecting to Kafka brokers at {}...", config.kafka_hosts);

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("linger.ms", config.kafka_producer_linger_ms.to_string())
            .set(
                "message.timeout.ms",
                config.kafka_message_timeout_ms.to_string(),
            )
            .set("compression.codec", config.kafka_compression_codec)
            .set(
                "queue.buffering.max.kbytes",
                (config.kafka_producer_queue_mib * 1024).to_string(),
            );

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka configuration: {:?}", client_config);
        let producer: FutureProducer<KafkaContext> =
            client_config.create_with_context(KafkaContext {})?;

        // Ping the cluster to make sure we can reach brokers, fail after 10 seconds
        let _metadata = producer.client().fetch_metadata(
            Some("__consumer_offsets"),
            Timeout::After(Duration::new(10, 0)),
        )?;
        info!("connected to Kafka brokers");

        Ok(KafkaSink {
            producer,
            topic: config.kafka_topic,
        })
    }

    pub fn flush(&self) -> Result<()> {
        // TODO: hook it up on shutdown
        self.producer
            .flush(Duration::new(30, 0))
            .context("failed to flush producer queue")
    }

    async fn kafka_send(
        producer: FutureProducer<KafkaContext>,
        topic: String,
        event: CustomerEvent,
    ) -> Result<DeliveryFuture> {
        let payload =
            serde_json::to_string(&event).context("failed to serialize customer event")?;
        let key = event.key();

        match producer.send_result(FutureRecord {
            topic: topic.as_str(),
            payload: Some(&payload),
            partition: None,
            key: Some(key.as_str()),
            timestamp: None,
            headers: None,
        }) {
            Ok(ack) => Ok(ack),
            Err((e, _)) => {
                counter!("customer_api_events_dropped_total").increment(1);
                Err(anyhow!("failed to produce customer event: {}", e))
            }
        }
    }

    async fn process_ack(delivery: DeliveryFuture) -> Result<()> {
        match delivery.await {
            Err(_) => {
                // Cancelled due to timeout while retrying
                counter!("customer_api_events_dropped_total").increment(1);
                error!("failed to produce customer event before write timeout");
                Err(anyhow!("delivery timed out"))
            }
            Ok(Err((err, _))) => {
                counter!("customer_api_events_dropped_total").increment(1);
                error!("failed to produce customer event: {}", err);
                Err(anyhow!("delivery failed: {}", err))
            }
            Ok(Ok(_)) => {
                counter!("customer_api_events_published_total").increment(1);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventSink for KafkaSink {
    async fn send(&self, event: CustomerEvent) -> Result<()> {
        let ack = Self::kafka_send(self.producer.clone(), self.topic.clone(), event).await?;
        Self::process_ack(ack).await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::KafkaConfig;
    use crate::event::CustomerEvent;
    use crate::sinks::kafka::KafkaSink;
    use crate::sinks::EventSink;
    use rdkafka::mocking::MockCluster;
    use rdkafka::producer::DefaultProducerContext;
    use rdkafka::types::{RDKafkaApiKey, RDKafkaRespErr};

    async fn start_on_mocked_sink() -> (MockCluster<'static, DefaultProducerContext>, KafkaSink) {
        let cluster = MockCluster::new(1).expect("failed to create mock brokers");
        let config = KafkaConfig {
            kafka_producer_linger_ms: 0,
            kafka_producer_queue_mib: 50,
            kafka_message_timeout_ms: 500,
            kafka_compression_codec: "none".to_string(),
            kafka_hosts: cluster.bootstrap_servers(),
            kafka_topic: "customer_events".to_string(),
            kafka_tls: false,
        };
        let sink = KafkaSink::new(config).expect("failed to create sink");
        (cluster, sink)
    }

    #[tokio::test]
    async fn kafka_sink_error_handling() {
        // Uses a mocked Kafka broker that allows injecting write errors, to check error handling.
        let (cluster, sink) = start_on_mocked_sink().await;
        let event = CustomerEvent::deleted(1);

        // Wait for the producer to be healthy, to keep kafka_message_timeout_ms short
        for _ in 0..20 {
            if sink.send(event.clone()).await.is_ok() {
                break;
            }
        }

        // Happy path
        sink.send(event.clone())
            .await
            .expect("failed to send initial event");

        // A sustained transient error exhausts the message timeout and surfaces as Err,
        // which callers swallow and log.
        let err = [RDKafkaRespErr::RD_KAFKA_RESP_ERR_BROKER_NOT_AVAILABLE; 50];
        cluster.request_errors(RDKafkaApiKey::Produce, &err);
        assert!(sink.send(event.clone()).await.is_err());

        // Recovers once the broker does
        cluster.clear_request_errors(RDKafkaApiKey::Produce);
        sink.send(event).await.expect("failed to send after recovery");
    }
}
