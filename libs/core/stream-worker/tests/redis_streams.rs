//! Redis Streams backend against a real Redis (testcontainers)

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use stream_worker::{
    QueueConsumer, QueueProducer, RedisStreamConsumer, RedisStreamProducer, StreamError,
    StreamJob, StreamProcessor, StreamWorker, WorkerConfig, connect, partition_for,
};
use test_utils::TestRedis;
use tokio::sync::watch;

fn config(consumer_id: &str) -> WorkerConfig {
    WorkerConfig::new("general-email", "email_workers")
        .with_partitions(4)
        .with_consumer_id(consumer_id)
        .with_poll_interval_ms(10)
}

#[tokio::test]
async fn test_publish_lands_on_key_partition() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn, "general-email", 4);

    let first = producer.publish("1activationemail", b"a").await.unwrap();
    let second = producer.publish("1activationemail", b"b").await.unwrap();

    let expected = partition_for("1activationemail", 4);
    assert_eq!(first.partition, expected);
    assert_eq!(second.partition, expected);
    assert_eq!(first.stream, format!("general-email:{}", expected));
    assert_ne!(first.stream_id, second.stream_id);
    assert_eq!(producer.partition_length(expected).await.unwrap(), 2);
}

#[tokio::test]
async fn test_consumer_reads_in_publish_order_and_acks() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn.clone(), "general-email", 4);

    let consumer = RedisStreamConsumer::new(conn, &config("reader-1"));
    consumer.init_consumer_groups().await.unwrap();
    // Second init hits BUSYGROUP and is ignored
    consumer.init_consumer_groups().await.unwrap();

    for i in 0..5 {
        producer
            .publish("7activationemail", format!("job-{}", i).as_bytes())
            .await
            .unwrap();
    }

    for i in 0..5 {
        let message = consumer.next_message().await.unwrap();
        assert_eq!(message.payload, format!("job-{}", i).into_bytes());
        assert_eq!(message.partition_key, "7activationemail");
        assert!(!message.is_redelivery());
        consumer.ack(&message).await.unwrap();
    }
}

#[tokio::test]
async fn test_unacked_messages_are_redelivered_after_restart() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn.clone(), "general-email", 4);

    let first_run = RedisStreamConsumer::new(conn.clone(), &config("reader-1"));
    first_run.init_consumer_groups().await.unwrap();

    producer.publish("9activationemail", b"acked").await.unwrap();
    producer.publish("9activationemail", b"lost").await.unwrap();

    let acked = first_run.next_message().await.unwrap();
    first_run.ack(&acked).await.unwrap();
    let lost = first_run.next_message().await.unwrap();
    assert_eq!(lost.payload, b"lost");
    first_run.close().await.unwrap();

    // Same consumer id after a crash picks up its pending entry first
    let second_run = RedisStreamConsumer::new(conn, &config("reader-1"));
    let redelivered = second_run.next_message().await.unwrap();

    assert_eq!(redelivered.stream_id, lost.stream_id);
    assert!(redelivered.is_redelivery());
}

#[tokio::test]
async fn test_entries_abandoned_by_another_consumer_are_claimed() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn.clone(), "general-email", 4);

    let crashed = RedisStreamConsumer::new(conn.clone(), &config("worker-a").with_claim_idle_ms(50));
    crashed.init_consumer_groups().await.unwrap();

    producer.publish("3activationemail", b"in-flight").await.unwrap();
    let in_flight = crashed.next_message().await.unwrap();
    crashed.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    // A restarted process comes up under a fresh consumer id
    let restarted = RedisStreamConsumer::new(conn, &config("worker-b").with_claim_idle_ms(50));
    let claimed = tokio::time::timeout(Duration::from_secs(5), restarted.next_message())
        .await
        .expect("abandoned entry was not claimed")
        .unwrap();

    assert_eq!(claimed.stream_id, in_flight.stream_id);
    assert_eq!(claimed.payload, b"in-flight");
    assert!(claimed.is_redelivery());
    restarted.ack(&claimed).await.unwrap();
}

#[tokio::test]
async fn test_buffered_entries_left_at_shutdown_are_claimed() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn.clone(), "general-email", 4);

    let first = RedisStreamConsumer::new(
        conn.clone(),
        &config("worker-a").with_batch_size(10).with_claim_idle_ms(50),
    );
    first.init_consumer_groups().await.unwrap();

    for i in 0..5 {
        producer
            .publish("5activationemail", format!("job-{}", i).as_bytes())
            .await
            .unwrap();
    }

    // One batch read delivers all five to worker-a; only the first is handled
    let handled = first.next_message().await.unwrap();
    first.ack(&handled).await.unwrap();
    first.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = RedisStreamConsumer::new(conn, &config("worker-b").with_claim_idle_ms(50));
    let mut payloads = Vec::new();
    for _ in 0..4 {
        let message = tokio::time::timeout(Duration::from_secs(5), second.next_message())
            .await
            .expect("buffered entry was not claimed")
            .unwrap();
        second.ack(&message).await.unwrap();
        payloads.push(String::from_utf8(message.payload).unwrap());
    }

    assert_eq!(payloads, vec!["job-1", "job-2", "job-3", "job-4"]);
}

#[tokio::test]
async fn test_fresh_entries_of_a_live_consumer_are_not_claimed() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn.clone(), "general-email", 4);

    let busy = RedisStreamConsumer::new(conn.clone(), &config("worker-a"));
    busy.init_consumer_groups().await.unwrap();
    producer.publish("4activationemail", b"working").await.unwrap();
    let _working = busy.next_message().await.unwrap();

    // Default idle threshold is far longer than the entry has been pending
    let other = RedisStreamConsumer::new(conn, &config("worker-b"));
    assert!(other.claim_abandoned().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_closed_consumer_returns_closed() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let consumer = RedisStreamConsumer::new(conn, &config("reader-1"));

    consumer.close().await.unwrap();
    assert!(matches!(consumer.next_message().await, Err(StreamError::Closed)));
}

struct Job(String);

impl StreamJob for Job {
    fn decode(payload: &[u8]) -> Result<Self, StreamError> {
        String::from_utf8(payload.to_vec())
            .map(Job)
            .map_err(|e| StreamError::malformed(e.to_string()))
    }

    fn job_id(&self) -> String {
        self.0.clone()
    }

    fn kind(&self) -> &'static str {
        "test"
    }

    fn target(&self) -> String {
        self.0.clone()
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<String>>);

#[async_trait]
impl StreamProcessor<Job> for Collect {
    async fn process(&self, job: &Job) -> Result<(), StreamError> {
        self.0.lock().unwrap().push(job.0.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Collect"
    }
}

#[tokio::test]
async fn test_worker_pool_over_redis() {
    let redis = TestRedis::new().await;
    let conn = connect(redis.connection_string()).await.unwrap();
    let producer = RedisStreamProducer::new(conn.clone(), "general-email", 4);

    let config = config("pool-1");
    let consumer = RedisStreamConsumer::new(conn, &config);
    consumer.init_consumer_groups().await.unwrap();

    for user in 0..10 {
        producer
            .publish(&format!("{}activationemail", user), format!("user-{}", user).as_bytes())
            .await
            .unwrap();
    }

    let processor = Arc::new(Collect::default());
    let worker = Arc::new(StreamWorker::with_arc_processor(
        Arc::new(consumer),
        Arc::clone(&processor),
        config,
    ));
    let (shutdown, rx) = watch::channel(false);
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        while worker.stats().succeeded < 10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("jobs were not delivered");

    shutdown.send(true).unwrap();
    let report = handle.await.unwrap().unwrap();

    assert_eq!(report.succeeded, 10);
    let mut seen = processor.0.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen.len(), 10);
    assert!(seen.contains(&"user-3".to_string()));
}
