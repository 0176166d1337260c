use super::*;
use crate::memory_writer::MemoryWriter;
use llmtap_core::{Error, row::FINISH_REASON_ABORTED, row::FINISH_REASON_ERROR};
use serde_json::json;
use std::time::Duration;

fn model() -> ModelInfo {
    ModelInfo::new("openai", "gpt-4o-mini")
}

fn params() -> CallParams {
    CallParams::new(json!({"prompt": "Say hello", "temperature": 0}))
}

fn chunks() -> Vec<StreamChunk> {
    vec![
        StreamChunk::StreamStart { warnings: vec![] },
        StreamChunk::text("0", "Hel"),
        StreamChunk::text("0", "lo, "),
        StreamChunk::text("0", "world"),
        StreamChunk::finish("stop", Some(json!({"inputTokens": 3, "outputTokens": 4}))),
    ]
}

fn stream_of(items: Vec<Result<StreamChunk>>) -> StreamResult {
    StreamResult::new(Box::new(futures::stream::iter(items)))
}

async fn wait_for_rows(writer: &MemoryWriter, expected: usize) -> Vec<CallRow> {
    for _ in 0..100 {
        if writer.len().await >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    writer.rows().await
}

#[tokio::test]
async fn test_generate_persists_and_returns_result_unchanged() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone());
    let response = ModelResponse::new(json!({"text": "hello", "finishReason": "stop"}));

    let expected = response.clone();
    let returned = middleware
        .wrap_generate(&model(), &params(), || async move { Ok(response) })
        .await
        .unwrap();

    assert_eq!(returned, expected);
    let rows = sink.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].output_text.as_deref(), Some("hello"));
    assert_eq!(rows[0].input_text.as_deref(), Some("[PROMPT]\nSay hello"));
    assert_eq!(rows[0].temperature, Some(0.0));
}

#[tokio::test]
async fn test_generate_error_is_reraised_unchanged() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone());

    let err = middleware
        .wrap_generate(&model(), &params(), || async { Err(Error::invocation("boom")) })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "boom");
    let rows = sink.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].finish_reason.as_deref(), Some(FINISH_REASON_ERROR));
    assert_eq!(rows[0].error_json.as_ref().unwrap().message, "boom");
    assert_eq!(rows[0].output_text, None);
}

#[tokio::test]
async fn test_stream_passes_chunks_through_and_persists_once() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone());
    let items: Vec<Result<StreamChunk>> = chunks().into_iter().map(Ok).collect();

    let result = middleware
        .wrap_stream(&model(), &params(), || async move { Ok(stream_of(items)) })
        .await
        .unwrap();
    let seen: Vec<StreamChunk> = result.stream.map(|c| c.unwrap()).collect().await;

    assert_eq!(seen, chunks());
    let rows = wait_for_rows(&sink, 1).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].output_text.as_deref(), Some("Hello, world"));
    assert_eq!(rows[0].usage.total_tokens, Some(7));
    assert_eq!(rows[0].meta_json.as_ref().unwrap()["streaming"], true);
}

#[tokio::test]
async fn test_stream_request_and_response_metadata_forwarded() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone());

    let result = middleware
        .wrap_stream(&model(), &CallParams::default(), || async {
            Ok(stream_of(vec![Ok(StreamChunk::finish("stop", None))])
                .with_request(json!({"model": "gpt-4o-mini"}))
                .with_response(json!({"headers": {"x-request-id": "req_42"}})))
        })
        .await
        .unwrap();

    assert_eq!(result.request, Some(json!({"model": "gpt-4o-mini"})));
    let _: Vec<_> = result.stream.collect().await;

    let rows = wait_for_rows(&sink, 1).await;
    assert_eq!(rows[0].request_id.as_deref(), Some("req_42"));
    assert_eq!(
        rows[0].input_text.as_deref(),
        Some("{\"model\":\"gpt-4o-mini\"}")
    );
}

#[tokio::test]
async fn test_stream_without_finish_persists_nothing() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone());

    let result = middleware
        .wrap_stream(&model(), &params(), || async {
            Ok(stream_of(vec![
                Ok(StreamChunk::text("0", "Hel")),
                Ok(StreamChunk::text("0", "lo")),
                Err(Error::StreamAborted("connection reset".to_string())),
            ]))
        })
        .await
        .unwrap();
    let seen: Vec<Result<StreamChunk>> = result.stream.collect().await;

    assert_eq!(seen.len(), 3);
    assert!(seen[2].is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.is_empty().await);
}

#[tokio::test]
async fn test_incomplete_stream_persisted_as_aborted_when_enabled() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone()).with_persist_incomplete_streams(true);

    let result = middleware
        .wrap_stream(&model(), &params(), || async {
            Ok(stream_of(vec![
                Ok(StreamChunk::text("0", "Hel")),
                Ok(StreamChunk::text("0", "lo")),
                Err(Error::StreamAborted("connection reset".to_string())),
            ]))
        })
        .await
        .unwrap();
    let _: Vec<_> = result.stream.collect().await;

    let rows = wait_for_rows(&sink, 1).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].finish_reason.as_deref(), Some(FINISH_REASON_ABORTED));
    assert_eq!(
        rows[0].error_json.as_ref().unwrap().message,
        "Stream aborted: connection reset"
    );
    let meta = rows[0].meta_json.as_ref().unwrap();
    assert_eq!(meta["partialOutput"], "Hello");
    assert_eq!(meta["aborted"], true);
}

#[tokio::test]
async fn test_dropped_stream_never_persists() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone()).with_persist_incomplete_streams(true);
    let items: Vec<Result<StreamChunk>> = chunks().into_iter().map(Ok).collect();

    let mut result = middleware
        .wrap_stream(&model(), &params(), || async move { Ok(stream_of(items)) })
        .await
        .unwrap();
    let first = result.stream.next().await;
    assert!(first.is_some());
    drop(result);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.is_empty().await);
}

#[tokio::test]
async fn test_stream_open_failure_persists_error_row() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone());

    let err = middleware
        .wrap_stream(&model(), &params(), || async {
            Err(Error::invocation("rate limited"))
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "rate limited");
    let rows = sink.rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].finish_reason.as_deref(), Some(FINISH_REASON_ERROR));
    assert_eq!(rows[0].meta_json.as_ref().unwrap()["streaming"], true);
}

#[tokio::test]
async fn test_disabled_middleware_records_nothing() {
    let sink = Arc::new(MemoryWriter::new());
    let config = CaptureConfig {
        enabled: false,
        ..Default::default()
    };
    let middleware = CaptureMiddleware::from_config(&config, sink.clone());
    assert!(!middleware.is_enabled());

    middleware
        .wrap_generate(&model(), &params(), || async {
            Ok(ModelResponse::new(json!({"text": "x"})))
        })
        .await
        .unwrap();
    let items: Vec<Result<StreamChunk>> = chunks().into_iter().map(Ok).collect();
    let result = middleware
        .wrap_stream(&model(), &params(), || async move { Ok(stream_of(items)) })
        .await
        .unwrap();
    let _: Vec<_> = result.stream.collect().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.is_empty().await);
}

#[tokio::test]
async fn test_each_call_gets_a_distinct_row() {
    let sink = Arc::new(MemoryWriter::new());
    let middleware = CaptureMiddleware::new(sink.clone()).with_tag_namespace("suite");
    let params = CallParams::new(json!({"prompt": "x", "providerOptions": {"suite": {"tags": "t1"}}}));

    for i in 0..10 {
        let _ = middleware
            .wrap_generate(&model(), &params, || async move {
                if i % 3 == 0 {
                    Err(Error::invocation(format!("failure {i}")))
                } else {
                    Ok(ModelResponse::new(json!({"text": i.to_string()})))
                }
            })
            .await;
    }

    let rows = sink.rows().await;
    assert_eq!(rows.len(), 10);
    let ids: std::collections::HashSet<_> = rows.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 10);
    assert_eq!(rows.iter().filter(|r| r.is_error()).count(), 4);
    assert!(rows.iter().all(|r| r.tags == Some(vec!["t1".to_string()])));
}
