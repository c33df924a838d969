//! Collaborator HTTP clients against a mock server.

use httpmock::prelude::*;
use serde_json::json;

use paperflow::collaborators::{
    Archive, ArchiveEntry, ArchiveUpdate, DecisionDelivery, ExtractionError, LanguageModel,
    ModelInput, PaperSource,
};
use paperflow::collaborators::{ArxivSource, CraftArchive, FeishuDelivery, OpenAiModel};
use paperflow::state::{keys, DecisionPayload, RunState};
use paperflow::types::RunId;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2401.12345v1</id>
    <published>2024-01-20T00:00:00Z</published>
    <title>Interruptible
      Pipelines</title>
    <summary>We study durable
      suspension.</summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
  </entry>
</feed>"#;

#[tokio::test]
async fn arxiv_source_parses_feed() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/query")
            .query_param("id_list", "2401.12345");
        then.status(200).body(ATOM_FEED);
    });

    let source = ArxivSource::with_api_base(server.base_url());
    let metadata = source
        .fetch("https://arxiv.org/abs/2401.12345")
        .await
        .expect("fetch");

    mock.assert();
    assert_eq!(metadata.title, "Interruptible Pipelines");
    assert_eq!(metadata.abstract_text, "We study durable suspension.");
    assert_eq!(metadata.authors, vec!["Ada Lovelace", "Alan Turing"]);
    assert_eq!(metadata.year, Some(2024));
    assert_eq!(
        metadata.pdf_url.as_deref(),
        Some("https://arxiv.org/pdf/2401.12345")
    );
}

#[tokio::test]
async fn arxiv_source_rejects_non_arxiv_urls() {
    let source = ArxivSource::with_api_base("http://localhost:9");
    let err = source
        .fetch("https://example.com/paper.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::UnsupportedSource { .. }));
}

#[tokio::test]
async fn arxiv_source_empty_feed_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/query");
        then.status(200)
            .body(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#);
    });

    let source = ArxivSource::with_api_base(server.base_url());
    let err = source
        .fetch("https://arxiv.org/abs/2401.99999")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::EmptyResult { .. }));
}

#[tokio::test]
async fn openai_model_roundtrips_fenced_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{
                "message": {
                    "content": "```json\n{\"summary\": \"fine\", \"suggested_action\": \"skim\"}\n```"
                }
            }]
        }));
    });

    let model = OpenAiModel::new(server.base_url(), "test-key", "test-model");
    let value = model
        .analyze("instructions", &ModelInput {
            text: "Title: x".to_string(),
            file_url: Some("https://arxiv.org/pdf/2401.12345".to_string()),
        })
        .await
        .expect("analyze");

    mock.assert();
    assert_eq!(value["summary"], "fine");
    assert_eq!(value["suggested_action"], "skim");
}

#[tokio::test]
async fn craft_upsert_reuses_entry_with_same_link() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/collections/papers/items");
        then.status(200).json_body(json!({
            "items": [
                { "id": "item-9", "properties": { "_2": "https://arxiv.org/abs/2401.12345" } }
            ]
        }));
    });
    // No POST mock: creation would 404 and fail the test.

    let archive = CraftArchive::new(server.base_url(), "papers");
    let entry = ArchiveEntry {
        title: "Interruptible Pipelines".to_string(),
        link: "https://arxiv.org/abs/2401.12345".to_string(),
        summary: "s".to_string(),
        tags: vec!["Agent".to_string()],
    };

    let first = archive.upsert_base(&entry).await.expect("first upsert");
    let second = archive.upsert_base(&entry).await.expect("second upsert");

    assert_eq!(first, "item-9");
    assert_eq!(second, "item-9");
    assert_eq!(list.hits(), 2);
}

#[tokio::test]
async fn craft_upsert_creates_when_absent() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/collections/papers/items");
        then.status(200).json_body(json!({ "items": [] }));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/collections/papers/items");
        then.status(200)
            .json_body(json!({ "items": [{ "id": "item-1" }] }));
    });

    let archive = CraftArchive::new(server.base_url(), "papers");
    let entry = ArchiveEntry {
        title: "New Paper".to_string(),
        link: "https://arxiv.org/abs/2402.00001".to_string(),
        summary: "s".to_string(),
        tags: vec![],
    };

    let id = archive.upsert_base(&entry).await.expect("upsert");
    create.assert();
    assert_eq!(id, "item-1");
}

#[tokio::test]
async fn craft_update_sends_doc_reference() {
    let server = MockServer::start();
    let update = server.mock(|when, then| {
        when.method(PUT)
            .path("/collections/papers/items")
            .json_body_partial(
                r#"{"items": [{"id": "item-1", "properties": {"_5": "Yes"}}]}"#,
            );
        then.status(200).json_body(json!({}));
    });

    let archive = CraftArchive::new(server.base_url(), "papers");
    archive
        .update(
            "item-1",
            &ArchiveUpdate {
                title: "New Paper".to_string(),
                deep_read: true,
                reading_doc_id: Some("doc-7".to_string()),
                tags: Some(vec!["Memory".to_string()]),
                comment: None,
            },
        )
        .await
        .expect("update");
    update.assert();
}

#[tokio::test]
async fn feishu_delivery_fetches_token_once_and_sends_card() {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method(POST)
            .path("/open-apis/auth/v3/tenant_access_token/internal");
        then.status(200).json_body(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-abc",
            "expire": 7200
        }));
    });
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/open-apis/im/v1/messages")
            .query_param("receive_id_type", "chat_id")
            .header("authorization", "Bearer t-abc");
        then.status(200).json_body(json!({ "code": 0, "msg": "success" }));
    });

    let delivery = FeishuDelivery::with_api_base(
        server.base_url(),
        "app",
        "secret",
        "verify",
        "oc_chat",
        "chat_id",
    );

    let mut state = RunState::new(RunId::derive("p"), "https://arxiv.org/abs/2401.12345");
    state.set(keys::TITLE, json!("Interruptible Pipelines"));
    state.set(keys::TRIAGE_SUMMARY, json!("summary"));
    let payload = DecisionPayload::from_state(&state);

    delivery.send_decision_card(&payload).await.expect("send 1");
    delivery.send_decision_card(&payload).await.expect("send 2");

    // Token cached between sends.
    token.assert_hits(1);
    send.assert_hits(2);
}
