use crate::helpers::{
    broker_with_queue, build, eventually, DoublingPipeline, Journal, RecordingObserver,
};
use carrot_worker::consumers::{ConnectionError, Consumer, ConsumerError, ConsumerState};
use std::time::Duration;

#[tokio::test]
async fn a_consumer_is_connected_once_built() {
    let (broker, queue_name) = broker_with_queue();

    let consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())),
        &broker,
    )
    .await;

    assert_eq!(consumer.state(), ConsumerState::Connected);
    assert_eq!(consumer.queue_name(), queue_name);
}

#[tokio::test]
async fn stop_requested_from_another_task_ends_the_consuming_loop() {
    // Arrange
    let journal = Journal::default();
    let (broker, queue_name) = broker_with_queue();
    let mut consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(journal.clone())),
        &broker,
    )
    .await;
    let stop_handle = consumer.stop_handle();

    let stopper = tokio::spawn({
        let stop_handle = stop_handle.clone();
        async move {
            eventually(|| stop_handle.state() == ConsumerState::Running).await;
            stop_handle.stop();
        }
    });

    // Act
    let outcome = tokio::time::timeout(Duration::from_secs(2), consumer.start())
        .await
        .expect("The consumer did not stop in time");

    // Assert
    assert!(outcome.is_ok());
    stopper.await.unwrap();
    assert_eq!(consumer.state(), ConsumerState::Stopped);

    // Nothing published after the stop gets processed.
    broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(journal.entries().is_empty());
    assert!(broker.acknowledged().is_empty());
}

#[tokio::test]
async fn stopping_twice_is_harmless() {
    let (broker, queue_name) = broker_with_queue();
    let consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())),
        &broker,
    )
    .await;

    consumer.stop();
    consumer.stop();
    consumer.stop_handle().stop();

    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn a_consumer_stopped_before_starting_never_processes_anything() {
    // Arrange
    let journal = Journal::default();
    let (broker, queue_name) = broker_with_queue();
    broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    let mut consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(journal.clone())),
        &broker,
    )
    .await;

    // Act
    consumer.stop();
    let outcome = consumer.start().await;

    // Assert
    assert!(matches!(
        outcome,
        Err(ConsumerError::NotConnected(ConsumerState::Stopped))
    ));
    assert!(journal.entries().is_empty());
    assert!(broker.acknowledged().is_empty());
}

#[tokio::test]
async fn a_fresh_consumer_takes_over_from_one_stopped_before_starting() {
    // Arrange
    let (broker, queue_name) = broker_with_queue();
    let tag = broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    let mut consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())),
        &broker,
    )
    .await;
    consumer.stop();
    assert!(consumer.start().await.is_err());

    // Act
    let journal = Journal::default();
    let mut fresh_consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(journal.clone())).exit_after(1),
        &broker,
    )
    .await;
    fresh_consumer.start().await.unwrap();

    // Assert
    assert_eq!(broker.acknowledged(), vec![tag]);
    assert!(journal.entries().contains(&"doubled 2".to_owned()));
    // The first consumer is still around, but it no longer holds the queue.
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn dropping_a_consumer_releases_its_queue() {
    // Arrange
    let (broker, queue_name) = broker_with_queue();
    let tag = broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    let consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())),
        &broker,
    )
    .await;

    // Act
    drop(consumer);
    let mut fresh_consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())).exit_after(1),
        &broker,
    )
    .await;
    fresh_consumer.start().await.unwrap();

    // Assert
    assert_eq!(broker.acknowledged(), vec![tag]);
}

#[tokio::test]
async fn a_consumer_cannot_be_started_twice() {
    let (broker, queue_name) = broker_with_queue();
    broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    let mut consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())).exit_after(1),
        &broker,
    )
    .await;

    consumer.start().await.unwrap();
    let outcome = consumer.start().await;

    assert!(matches!(
        outcome,
        Err(ConsumerError::NotConnected(ConsumerState::Stopped))
    ));
}

#[tokio::test]
async fn the_delivery_in_flight_is_completed_when_stopping() {
    // Arrange
    let journal = Journal::default();
    let observer = RecordingObserver::with_journal(journal.clone());
    let (broker, queue_name) = broker_with_queue();
    let first = broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    let second = broker.publish(&queue_name, r#"{"n":2}"#).unwrap();

    let pipeline = DoublingPipeline {
        journal: journal.clone(),
        work: Duration::from_millis(200),
    };
    let mut consumer = build(
        Consumer::builder(&queue_name, pipeline).with_observer(observer),
        &broker,
    )
    .await;
    let stop_handle = consumer.stop_handle();
    tokio::spawn({
        let journal = journal.clone();
        async move {
            eventually(|| journal.entries().iter().any(|e| e.starts_with("execute"))).await;
            stop_handle.stop();
        }
    });

    // Act
    tokio::time::timeout(Duration::from_secs(2), consumer.start())
        .await
        .expect("The consumer did not stop in time")
        .unwrap();

    // Assert
    assert_eq!(broker.acknowledged(), vec![first]);
    assert!(journal.entries().contains(&"doubled 2".to_owned()));
    assert!(!journal.entries().contains(&format!("dispatch {second}")));

    // The second delivery is still in the queue, waiting for the next consumer.
    let mut next_consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(journal.clone())).exit_after(1),
        &broker,
    )
    .await;
    next_consumer.start().await.unwrap();
    assert_eq!(broker.acknowledged(), vec![first, second]);
    assert!(journal.entries().contains(&"doubled 4".to_owned()));
}

#[tokio::test]
async fn a_broken_channel_ends_the_loop_with_an_error() {
    // Arrange
    let journal = Journal::default();
    let (broker, queue_name) = broker_with_queue();
    let tag = broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    broker.fail(&queue_name, "connection reset by peer").unwrap();
    let mut consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(journal.clone())),
        &broker,
    )
    .await;

    // Act
    let outcome = consumer.start().await;

    // Assert
    let Err(ConsumerError::Transport(e)) = outcome else {
        panic!("Expected a transport error");
    };
    assert!(e.to_string().contains("connection reset by peer"));
    assert_eq!(broker.acknowledged(), vec![tag]);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn the_loop_ends_when_the_broker_closes_the_subscription() {
    let (broker, queue_name) = broker_with_queue();
    let first = broker.publish(&queue_name, r#"{"n":1}"#).unwrap();
    let second = broker.publish(&queue_name, r#"{"n":2}"#).unwrap();
    broker.close(&queue_name);
    let mut consumer = build(
        Consumer::builder(&queue_name, DoublingPipeline::new(Journal::default())),
        &broker,
    )
    .await;

    consumer.start().await.unwrap();

    assert_eq!(broker.acknowledged(), vec![first, second]);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn subscribing_to_a_missing_queue_fails() {
    let (broker, _) = broker_with_queue();

    let outcome = Consumer::builder("not-declared", DoublingPipeline::new(Journal::default()))
        .with_channel(broker.channel())
        .await;

    let Err(ConnectionError::Subscription { queue_name, .. }) = outcome else {
        panic!("Expected a subscription error");
    };
    assert_eq!(queue_name, "not-declared");
}

#[tokio::test]
async fn an_invalid_broker_address_is_reported_as_such() {
    let outcome = Consumer::connect(
        "localhost:not-a-port",
        "jobs",
        DoublingPipeline::new(Journal::default()),
    )
    .await;

    let Err(ConnectionError::InvalidAddress { address, .. }) = outcome else {
        panic!("Expected an invalid address error");
    };
    assert_eq!(address, "localhost:not-a-port");
}

#[tokio::test]
async fn an_unreachable_broker_is_reported_as_such() {
    // Nothing listens on port 1.
    let outcome = Consumer::connect(
        "127.0.0.1:1",
        "jobs",
        DoublingPipeline::new(Journal::default()),
    )
    .await;

    assert!(matches!(outcome, Err(ConnectionError::Unreachable(_))));
}
