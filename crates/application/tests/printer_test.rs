use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use application::printer::encoder;
use application::printer::{ChunkedWriter, EncodedPayload, FixedPacing, NoPacing};
use application::{PrintQueue, PrintService, TransportSession};
use domain::{
    ConnectError, ConnectionState, DeviceFilter, PrintError, ReceiptRecord, ReceiptTemplate,
    WriteError,
};
use infrastructure::MockTransport;
use tokio_util::sync::CancellationToken;

fn devotee_record() -> ReceiptRecord {
    ReceiptRecord::new("D100", "2024-03-01", "Blessing").with_name("A. Devotee")
}

fn writer(chunk_size: usize) -> ChunkedWriter {
    ChunkedWriter::new(NonZeroUsize::new(chunk_size).unwrap(), NoPacing)
}

fn setup(transport: &MockTransport) -> Arc<TransportSession> {
    Arc::new(TransportSession::new(Arc::new(transport.clone())))
}

#[tokio::test]
async fn test_print_receipt_splits_payload_into_ordered_chunks() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();

    let service = PrintService::new(session.clone(), writer(20));
    service.print_receipt(&devotee_record()).await.unwrap();

    let expected = encoder::encode(&devotee_record(), &ReceiptTemplate::default());
    let writes = transport.last_link().unwrap().writes();
    assert_eq!(writes.len(), expected.len().div_ceil(20));
    assert!(writes.iter().all(|chunk| chunk.len() <= 20));
    assert_eq!(writes.concat(), expected.as_bytes());
}

#[tokio::test]
async fn test_print_receipt_without_session_writes_nothing() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    let service = PrintService::new(session, writer(20));

    let result = service.print_receipt(&devotee_record()).await;

    assert_eq!(result, Err(PrintError::NotConnected));
    assert!(transport.all_writes().is_empty());
}

#[tokio::test]
async fn test_print_receipt_rejects_incomplete_record() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let service = PrintService::new(session, writer(20));

    let record = ReceiptRecord::new("D100", "2024-03-01", "  ");
    let result = service.print_receipt(&record).await;

    assert_eq!(result, Err(PrintError::InvalidRecord("item")));
    assert!(transport.all_writes().is_empty());
}

#[tokio::test]
async fn test_cancelled_selection_stays_disconnected() {
    let transport = MockTransport::new().cancel_selection();
    let session = setup(&transport);

    let result = session.discover_and_connect(&DeviceFilter::default()).await;

    assert_eq!(result.err(), Some(ConnectError::NoDeviceSelected));
    assert_eq!(session.status().state, ConnectionState::Disconnected);
    assert_eq!(session.status().generation, 0);
    assert!(transport.links().is_empty());
}

#[tokio::test]
async fn test_unavailable_stack_is_reported() {
    let transport = MockTransport::new().unavailable();
    let session = setup(&transport);

    let result = session.discover_and_connect(&DeviceFilter::default()).await;

    assert_eq!(result.err(), Some(ConnectError::TransportUnavailable));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_missing_service_releases_link() {
    let transport = MockTransport::new().without_service();
    let session = setup(&transport);

    let result = session.discover_and_connect(&DeviceFilter::default()).await;

    assert!(matches!(result, Err(ConnectError::ServiceNotFound(_))));
    assert_eq!(session.status().state, ConnectionState::Disconnected);
    assert_eq!(transport.last_link().unwrap().disconnect_calls(), 1);
}

#[tokio::test]
async fn test_missing_characteristic_releases_link() {
    let transport = MockTransport::new().without_characteristic();
    let session = setup(&transport);

    let result = session.discover_and_connect(&DeviceFilter::default()).await;

    assert!(matches!(result, Err(ConnectError::CharacteristicNotFound(_))));
    assert_eq!(session.connected_device_label(), None);
    assert_eq!(transport.last_link().unwrap().disconnect_calls(), 1);
}

#[tokio::test]
async fn test_failed_connect_is_reported() {
    let transport = MockTransport::new().failing_connect("GATT error 133");
    let session = setup(&transport);

    let result = session.discover_and_connect(&DeviceFilter::default()).await;

    assert_eq!(
        result.err(),
        Some(ConnectError::ConnectionFailed("GATT error 133".to_string()))
    );
    assert_eq!(session.status().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connected_label_and_explicit_disconnect() {
    let transport = MockTransport::new();
    let session = setup(&transport);

    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    assert_eq!(session.connected_device_label().as_deref(), Some("BT-Printer"));
    assert_eq!(session.status().indicator().connect_button, "Change Printer");

    session.disconnect().await;
    session.disconnect().await;

    assert_eq!(session.connected_device_label(), None);
    assert!(session.current().await.is_none());
    assert_eq!(transport.last_link().unwrap().disconnect_calls(), 1);
}

#[tokio::test]
async fn test_reconnect_tears_down_previous_session() {
    let transport = MockTransport::new();
    let session = setup(&transport);

    let first = session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let second = session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();

    let links = transport.links();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].disconnect_calls(), 1);
    assert!(!first.is_connected());
    assert!(second.is_connected());
    assert_eq!(session.status().generation, second.generation());
}

#[tokio::test]
async fn test_reconnect_continues_when_previous_disconnect_fails() {
    let transport = MockTransport::new().failing_disconnect("stack busy");
    let session = setup(&transport);

    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let result = session.discover_and_connect(&DeviceFilter::default()).await;

    assert!(result.is_ok());
    assert!(session.is_connected());
    assert_eq!(transport.links()[0].disconnect_calls(), 1);
}

#[tokio::test]
async fn test_stale_link_drop_does_not_affect_new_session() {
    let transport = MockTransport::new().failing_disconnect("stack busy");
    let session = setup(&transport);

    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();

    // The first device finally goes away
    transport.links()[0].emit_disconnect();

    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_waits_for_pending_connect() {
    let transport = MockTransport::new().with_connect_delay(Duration::from_millis(100));
    let session = setup(&transport);

    let connecting = {
        let session = session.clone();
        tokio::spawn(async move { session.discover_and_connect(&DeviceFilter::default()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.disconnect().await;

    let printer = connecting.await.unwrap().unwrap();
    assert!(!printer.is_connected());
    assert!(!session.is_connected());
    assert!(session.current().await.is_none());
    assert_eq!(transport.last_link().unwrap().disconnect_calls(), 1);
}

#[tokio::test]
async fn test_dropped_session_is_released() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let link = transport.last_link().unwrap();
    let held = link.open_handles();

    link.emit_disconnect();

    assert!(session.current().await.is_none());
    assert_eq!(link.open_handles(), held - 1);
    assert_eq!(session.status().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_mid_transfer_stops_writer() {
    let transport = MockTransport::new().disconnect_after_writes(2);
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();

    let printer = session.current().await.unwrap();
    let payload = encoder::encode(&devotee_record(), &ReceiptTemplate::default());
    let result = writer(20).write_all(&payload, &printer).await;

    assert_eq!(result, Err(WriteError::NotConnected));
    assert_eq!(transport.last_link().unwrap().writes().len(), 2);
    assert_eq!(session.connected_device_label(), None);
}

#[tokio::test]
async fn test_drop_after_last_chunk_keeps_completed_print() {
    let payload = encoder::encode(&devotee_record(), &ReceiptTemplate::default());
    let transport = MockTransport::new().disconnect_after_writes(payload.len().div_ceil(20));
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let service = PrintService::new(session.clone(), writer(20));

    let result = service.print_receipt(&devotee_record()).await;

    assert_eq!(result, Ok(()));
    assert_eq!(transport.last_link().unwrap().received(), payload.as_bytes());
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_lost_connection_maps_to_print_error() {
    let transport = MockTransport::new().disconnect_after_writes(1);
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let service = PrintService::new(session, writer(20));

    let result = service.print_receipt(&devotee_record()).await;

    assert_eq!(result, Err(PrintError::LostConnection));
}

#[tokio::test]
async fn test_write_failure_maps_to_send_failed() {
    let transport = MockTransport::new().failing_write_at(1, "buffer overflow");
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let service = PrintService::new(session.clone(), writer(20));

    let result = service.print_receipt(&devotee_record()).await;

    assert_eq!(
        result,
        Err(PrintError::SendFailed("buffer overflow".to_string()))
    );
    // Write failure alone does not end the session
    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_pacing_between_chunks() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let printer = session.current().await.unwrap();

    let paced = ChunkedWriter::new(
        NonZeroUsize::new(4).unwrap(),
        FixedPacing(Duration::from_millis(50)),
    );
    let payload = EncodedPayload::from(vec![0u8; 10]);

    let started = tokio::time::Instant::now();
    paced.write_all(&payload, &printer).await.unwrap();

    // Three chunks, two gaps
    assert_eq!(started.elapsed(), Duration::from_millis(100));
    assert_eq!(transport.last_link().unwrap().writes().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_pacing_delay() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let printer = session.current().await.unwrap();
    let link = transport.last_link().unwrap();

    let dropper = link.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(70)).await;
        dropper.emit_disconnect();
    });

    let paced = ChunkedWriter::new(
        NonZeroUsize::new(4).unwrap(),
        FixedPacing(Duration::from_millis(50)),
    );
    let payload = EncodedPayload::from(vec![0u8; 16]);
    let started = tokio::time::Instant::now();
    let result = paced.write_all(&payload, &printer).await;

    assert_eq!(result, Err(WriteError::NotConnected));
    assert_eq!(link.writes().len(), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(70));
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout() {
    let transport = MockTransport::new().with_write_delay(Duration::from_secs(5));
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let printer = session.current().await.unwrap();

    let bounded = writer(20).with_write_timeout(Some(Duration::from_secs(1)));
    let result = bounded.write_all(&EncodedPayload::from(vec![1u8; 3]), &printer).await;

    assert!(matches!(result, Err(WriteError::TransportError(_))));
}

#[tokio::test]
async fn test_empty_payload_issues_no_writes() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let printer = session.current().await.unwrap();

    writer(20)
        .write_all(&EncodedPayload::from(Vec::new()), &printer)
        .await
        .unwrap();

    assert!(transport.all_writes().is_empty());
}

#[tokio::test]
async fn test_every_length_and_chunk_size_arrives_intact() {
    let transport = MockTransport::new();
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();
    let printer = session.current().await.unwrap();
    let link = transport.last_link().unwrap();

    for len in 0..70usize {
        let payload = EncodedPayload::from((0..len).map(|i| i as u8).collect::<Vec<u8>>());
        for chunk_size in 1..25usize {
            let before = link.writes().len();
            writer(chunk_size).write_all(&payload, &printer).await.unwrap();

            let sent = link.writes().split_off(before);
            assert_eq!(sent.len(), len.div_ceil(chunk_size), "len {len} chunk {chunk_size}");
            assert!(sent.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= chunk_size));
            assert_eq!(sent.concat(), payload.as_bytes());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_queue_runs_jobs_one_at_a_time() {
    let transport = MockTransport::new().with_write_delay(Duration::from_millis(5));
    let session = setup(&transport);
    session
        .discover_and_connect(&DeviceFilter::default())
        .await
        .unwrap();

    let service = PrintService::new(session, writer(20));
    let (queue, handle) = PrintQueue::new(service, 8);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(queue.run(cancel.clone()));

    let first = ReceiptRecord::new("D1", "2024-03-01", "Blessing");
    let second = ReceiptRecord::new("D2", "2024-03-02", "Prasad");
    let (a, b) = tokio::join!(handle.print(first.clone()), handle.print(second.clone()));
    assert!(a.is_ok());
    assert!(b.is_ok());

    let template = ReceiptTemplate::default();
    let received = transport.last_link().unwrap().received();
    let one = encoder::encode(&first, &template).into_bytes();
    let two = encoder::encode(&second, &template).into_bytes();
    assert!(received == [one.clone(), two.clone()].concat() || received == [two, one].concat());

    cancel.cancel();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_queue_handle_after_shutdown() {
    let transport = MockTransport::new();
    let service = PrintService::new(setup(&transport), writer(20));
    let (queue, handle) = PrintQueue::new(service, 1);
    drop(queue);

    let result = handle.print(devotee_record()).await;

    assert!(matches!(result, Err(PrintError::SendFailed(_))));
}
