//! Integration tests for the analysis HTTP API.
//!
//! Each test spins up an Axum server on a random port and exercises the
//! real REST contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use email_triage::api::analysis_routes;
use email_triage::config::AnalyzerConfig;
use email_triage::error::LlmError;
use email_triage::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Role};
use email_triage::pipeline::EmailAnalyzer;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const LOAN_EMAIL: &str = "Bom dia, gostaria de saber o status da minha solicitação de \
                          empréstimo. Preciso de uma atualização urgente.";

const STUB_REPLY: &str = "Recebemos sua mensagem e nossa equipe dará retorno em breve.";

/// Stub LLM: classifies everything as productive and writes a fixed reply.
struct StubLlm;

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let classifying = request
            .messages
            .iter()
            .any(|m| m.role == Role::User && m.content.contains("PRODUTIVO ou IMPRODUTIVO"));
        let content = if classifying { "PRODUTIVO" } else { STUB_REPLY };
        Ok(CompletionResponse {
            content: content.to_string(),
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}

/// Start an Axum server on a random port, return the base URL.
async fn start_server(llm: Option<Arc<dyn LlmProvider>>) -> String {
    let analyzer = Arc::new(EmailAnalyzer::new(AnalyzerConfig::default(), llm, None));
    let app = analysis_routes(analyzer, 1024 * 1024);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn post_json(base: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/analyze"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn post_form(base: &str, form: Form) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/analyze"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "email-triage");
    })
    .await
    .expect("Test timed out");
}

// ── JSON endpoint ───────────────────────────────────────────────────

#[tokio::test]
async fn productive_email_via_json() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let (status, json) = post_json(&base, serde_json::json!({ "email_text": LOAN_EMAIL })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["category"], "productive");
        assert_eq!(json["method"], "rules");
        assert_eq!(json["generated_by"], "template");
        assert!(json["confidence"].as_f64().unwrap() > 0.7);
        assert!(json["confidence_percent"].as_str().unwrap().ends_with('%'));
        assert_eq!(json["suggested_actions"].as_array().unwrap().len(), 5);
        assert!(!json["response"].as_str().unwrap().is_empty());
        assert!(json["reasoning"].as_str().unwrap().contains("Patterns found"));
        assert!(json["analyzed_at"].is_string());
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn greeting_is_unproductive() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let (status, json) = post_json(
            &base,
            serde_json::json!({
                "email_text": "Feliz Natal e próspero ano novo! Obrigado pela parceria durante todo o ano."
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["category"], "unproductive");
        assert_eq!(json["suggested_actions"].as_array().unwrap().len(), 3);
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn short_text_returns_validation_result() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let (status, json) = post_json(&base, serde_json::json!({ "email_text": "Oi" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["category"], "unproductive");
        assert_eq!(json["method"], "validation");
        assert_eq!(json["confidence_percent"], "50.0%");
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn empty_text_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;

        let (status, json) = post_json(&base, serde_json::json!({ "email_text": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, _) = post_json(&base, serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn llm_decision_gets_generated_reply() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(Some(Arc::new(StubLlm))).await;
        let (status, json) = post_json(&base, serde_json::json!({ "email_text": LOAN_EMAIL })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["category"], "productive");
        assert_eq!(json["method"], "hybrid(rules+llm)");
        assert_eq!(json["generated_by"], "llm");
        assert_eq!(json["response"], STUB_REPLY);
    })
    .await
    .expect("Test timed out");
}

// ── Multipart endpoint ──────────────────────────────────────────────

#[tokio::test]
async fn text_file_upload() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let part = Part::bytes(LOAN_EMAIL.as_bytes().to_vec())
            .file_name("email.txt")
            .mime_str("text/plain")
            .unwrap();
        let (status, json) = post_form(&base, Form::new().part("email_file", part)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["categoria"], "PRODUTIVO");
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn eml_file_upload() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let raw = "From: cliente@example.com\r\n\
                   Subject: Segunda via do boleto\r\n\
                   Content-Type: text/plain; charset=utf-8\r\n\
                   \r\n\
                   Preciso da segunda via do boleto de pagamento, por favor. É urgente.\r\n";
        let part = Part::bytes(raw.as_bytes().to_vec()).file_name("mensagem.eml");
        let (status, json) = post_form(&base, Form::new().part("email_file", part)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["categoria"], "PRODUTIVO");
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn form_text_field() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let form = Form::new().text("email_text", LOAN_EMAIL);
        let (status, json) = post_form(&base, form).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["metodo_classificacao"], "rules");
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn form_response_has_portuguese_shape() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let form = Form::new().text("email_text", LOAN_EMAIL);
        let (status, json) = post_form(&base, form).await;
        assert_eq!(status, StatusCode::OK);

        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "acoes_sugeridas",
                "categoria",
                "confianca",
                "gerado_por",
                "justificativa",
                "metodo_classificacao",
                "resposta_automatica",
            ]
        );
        assert_eq!(json["categoria"], "PRODUTIVO");
        assert!(json["confianca"].as_str().unwrap().ends_with('%'));
        assert_eq!(json["gerado_por"], "template");
        assert_eq!(json["acoes_sugeridas"].as_array().unwrap().len(), 5);
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let part = Part::bytes(b"PK\x03\x04".to_vec()).file_name("relatorio.docx");
        let (status, json) = post_form(&base, Form::new().part("email_file", part)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("docx"));
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn form_without_input_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(None).await;
        let form = Form::new().text("other", "value");
        let (status, _) = post_form(&base, form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    })
    .await
    .expect("Test timed out");
}
