use laneforge::config::Config;
use laneforge::pipeline::{Generator, ARTIFACT_FILE_NAME};
use laneforge::plantuml::encode::{self, Encoding};
use laneforge::plantuml::Variant;
use laneforge::provider::factory::create_provider;
use laneforge::render::DiagramFetcher;
use laneforge::workflow::WorkflowError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 60, "total_tokens": 180}
    })
}

fn config_for(server: &MockServer, variant: Variant) -> Config {
    let mut cfg = Config::default();
    cfg.providers.openai.api_key = "sk-test".into();
    cfg.providers.openai.api_base = server.uri();
    cfg.render.server = format!("{}/plantuml", server.uri());
    cfg.render.variant = variant;
    cfg
}

fn generator(cfg: &Config) -> Generator {
    let provider = create_provider(cfg).unwrap();
    Generator::from_config(cfg, Arc::from(provider))
}

const ORDER_FLOW: &str = r#"{
  "actors": ["Customer", "System"],
  "steps": [
    {"actor": "Customer", "action": "Place order", "type": "start"},
    {"actor": "System", "action": "Validate payment", "type": "task"},
    {"actor": "System", "action": "Payment ok?", "type": "gateway"},
    {"actor": "Warehouse", "action": "Ship order", "type": "end"}
  ]
}"#;

#[tokio::test]
async fn test_generate_compact_end_to_end() {
    laneforge::logger::init_test();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.2,
            "n": 1
        })))
        .and(body_string_contains("Customer places an order"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&format!("```json\n{}\n```", ORDER_FLOW))),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let cfg = config_for(&mock_server, Variant::Compact);
    let generation = generator(&cfg)
        .generate("Customer places an order, System validates payment, Warehouse ships order")
        .await
        .unwrap();

    assert_eq!(generation.document.steps.len(), 4);
    assert_eq!(generation.repaired_actors, vec!["Warehouse"]);
    assert!(generation.markup.contains("  lane Warehouse {"));
    assert!(generation.markup.contains("    gateway System_2 : Payment ok?"));
    let edges = generation.markup.lines().filter(|l| l.contains(" --> ")).count();
    assert_eq!(edges, 3);

    assert!(generation
        .image_url
        .starts_with(&format!("{}/plantuml/svg/", mock_server.uri())));
    assert_eq!(
        encode::decode(&generation.encoded, Encoding::Deflate).unwrap(),
        generation.markup
    );

    let dir = tempfile::tempdir().unwrap();
    let written = generation.write_markup(dir.path()).unwrap();
    assert_eq!(written.file_name().unwrap(), ARTIFACT_FILE_NAME);
}

#[tokio::test]
async fn test_generate_classic_rejects_fenced_reply() {
    let mock_server = MockServer::start().await;
    let fenced = format!("```json\n{}\n```", ORDER_FLOW);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&fenced)))
        .mount(&mock_server)
        .await;

    let cfg = config_for(&mock_server, Variant::Classic);
    let err = generator(&cfg).generate("anything").await.unwrap_err();
    let err = err
        .downcast_ref::<WorkflowError>()
        .expect("malformed completions surface as WorkflowError");
    assert!(matches!(err, WorkflowError::MalformedJson { .. }));
    assert_eq!(err.raw(), Some(fenced.as_str()));
}

#[tokio::test]
async fn test_generate_classic_plain_reply() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(ORDER_FLOW)))
        .mount(&mock_server)
        .await;

    let cfg = config_for(&mock_server, Variant::Classic);
    let generation = generator(&cfg).generate("anything").await.unwrap();

    // The Warehouse step has no lane but still takes part in the chain.
    assert!(!generation.markup.contains("Ship order"));
    assert!(generation.markup.contains("System_2 --> Warehouse_3"));
    assert!(generation.encoded.starts_with("%40startuml"));
    assert_eq!(
        encode::decode(&generation.encoded, Encoding::Percent).unwrap(),
        generation.markup
    );
}

#[tokio::test]
async fn test_api_error_is_not_a_workflow_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Invalid API key"}})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let cfg = config_for(&mock_server, Variant::Compact);
    let err = generator(&cfg).generate("anything").await.unwrap_err();
    assert!(err.downcast_ref::<WorkflowError>().is_none());
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_fetch_rendered_diagram() {
    let mock_server = MockServer::start().await;
    let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>";

    Mock::given(method("GET"))
        .and(path_regex(r"^/plantuml/svg/[0-9A-Za-z_-]+=*$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(svg, "image/svg+xml"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let segment = encode::encode("@startuml\nA -> B\n@enduml", Encoding::Deflate).unwrap();
    let url = format!("{}/plantuml/svg/{}", mock_server.uri(), segment);

    let fetcher = DiagramFetcher::new(Duration::from_secs(5)).unwrap();
    let image = fetcher.fetch(&url).await.unwrap();
    assert_eq!(image.content_type, "image/svg+xml");
    assert_eq!(image.bytes, svg.as_bytes());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("diagram.svg");
    image.save(&out).unwrap();
    assert_eq!(std::fs::read_to_string(out).unwrap(), svg);
}

#[tokio::test]
async fn test_fetch_reports_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let fetcher = DiagramFetcher::new(Duration::from_secs(5)).unwrap();
    let err = fetcher
        .fetch(&format!("{}/plantuml/svg/abc", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}
