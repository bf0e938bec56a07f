//! End-to-end suite runs against the stub transport.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apicheck::errors::{ResolveError, RunError, SpecError, TransportError};
use apicheck::request::ConcreteRequest;
use apicheck::runner::{Orchestrator, TestStatus};
use apicheck::suite::{parse_str, Method};
use apicheck::transport::{HttpResponse, Transport};
use apicheck::validation::FailureKind;
use common::{record, run_yaml, statuses, StubTransport};
use serde_json::json;

const BASE: &str = "https://api.magicthegathering.io/v1";

fn lotus_body() -> serde_json::Value {
    json!({
        "cards": [
            {"id": "bd8fa327", "name": "Black Lotus", "manaCost": "{0}", "cmc": 0, "set": "LEA"}
        ]
    })
}

const LOTUS_SUITE: &str = r#"
constants:
  base_url: "https://api.magicthegathering.io/v1"
tests:
  - name: Get Black Lotus
    description: Search cards by name
    request:
      method: GET
      endpoint: "{{base_url}}/cards"
      params:
        name: Black Lotus
    expected:
      status: 200
      response:
        type: json
        json:
          - key: cards
            type: list
            not_empty: true
          - key: cards[0].name
            equal: Black Lotus
          - key: cards[0].cmc
            range: {min: 0, max: 16}
"#;

#[test]
fn matching_response_passes() {
    let transport = StubTransport::new().json(
        Method::Get,
        &format!("{BASE}/cards?name=Black+Lotus"),
        200,
        lotus_body(),
    );
    let records = run_yaml(&transport, LOTUS_SUITE);

    assert_eq!(statuses(&records), vec![("Get Black Lotus", TestStatus::Passed)]);
    let lotus = &records[0];
    assert!(lotus.failures().is_empty());
    assert!(lotus.execution_time().is_some());
    assert!(lotus.response_time().is_some());
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn not_found_is_a_status_mismatch() {
    let transport = StubTransport::new().json(
        Method::Get,
        &format!("{BASE}/cards?name=Black+Lotus"),
        404,
        json!({"cards": [{"name": "Black Lotus", "cmc": 0}]}),
    );
    let records = run_yaml(&transport, LOTUS_SUITE);

    let lotus = &records[0];
    assert_eq!(lotus.status(), TestStatus::Failed);
    assert_eq!(lotus.failures().len(), 1);
    assert_eq!(lotus.failures()[0].kind, FailureKind::StatusMismatch);
    assert!(lotus.failure_reasons()[0].contains("404"));
}

#[test]
fn two_violated_rules_give_two_failures() {
    let transport = StubTransport::new().json(
        Method::Get,
        &format!("{BASE}/cards?name=Black+Lotus"),
        200,
        json!({"cards": [{"name": "Mox Pearl", "cmc": 20}]}),
    );
    let records = run_yaml(&transport, LOTUS_SUITE);

    let kinds: Vec<_> = records[0].failures().iter().map(|failure| failure.kind).collect();
    assert_eq!(records[0].status(), TestStatus::Failed);
    assert_eq!(kinds.len(), 2);
}

#[test]
fn response_from_feeds_a_later_request() {
    let yaml = r#"
constants:
  base_url: "https://api.magicthegathering.io/v1"
tests:
  - name: Card detail
    request:
      method: GET
      endpoint: "{{base_url}}/cards"
      params:
        id:
          response_from:
            name: Get Black Lotus
            response:
              json:
                - key: cards[0].id
    expected:
      status: 200
      response:
        json:
          - key: cards[0].set
            equal: LEA
  - name: Get Black Lotus
    request:
      method: GET
      endpoint: "{{base_url}}/cards"
      params: {name: Black Lotus}
    expected: {status: 200}
"#;
    let transport = StubTransport::new()
        .json(Method::Get, &format!("{BASE}/cards?name=Black+Lotus"), 200, lotus_body())
        .json(Method::Get, &format!("{BASE}/cards?id=bd8fa327"), 200, lotus_body());
    let records = run_yaml(&transport, yaml);

    // Reported in declaration order, executed in dependency order.
    assert_eq!(
        statuses(&records),
        vec![
            ("Card detail", TestStatus::Passed),
            ("Get Black Lotus", TestStatus::Passed)
        ]
    );
    let urls: Vec<String> = transport.calls().into_iter().map(|call| call.url).collect();
    assert_eq!(
        urls,
        vec![
            format!("{BASE}/cards?name=Black+Lotus"),
            format!("{BASE}/cards?id=bd8fa327"),
        ]
    );
}

#[test]
fn cycle_fails_both_tests_without_any_request() {
    let yaml = r#"
- name: A
  request:
    method: GET
    endpoint: "https://api.example.test/a"
    params: {b: {response_from: {name: B, key: id}}}
  expected: {status: 200}
- name: B
  request:
    method: GET
    endpoint: "https://api.example.test/b"
    params: {a: {response_from: {name: A, key: id}}}
  expected: {status: 200}
"#;
    let transport = StubTransport::new();
    let records = run_yaml(&transport, yaml);

    assert_eq!(
        statuses(&records),
        vec![("A", TestStatus::Error), ("B", TestStatus::Error)]
    );
    for record in &records {
        assert!(matches!(
            record.error(),
            Some(RunError::Spec(SpecError::CyclicDependency { .. }))
        ));
    }
    assert_eq!(transport.call_count(), 0);
}

#[test]
fn failed_dependency_errors_only_its_dependents() {
    let yaml = r#"
- name: list
  request: {method: GET, endpoint: "https://api.example.test/cards"}
  expected: {status: 200}
- name: detail
  request:
    method: GET
    endpoint: "https://api.example.test/cards"
    params: {id: {response_from: {name: list, key: "cards[0].id"}}}
  expected: {status: 200}
- name: health
  request: {method: GET, endpoint: "https://api.example.test/health"}
  expected: {status: 200}
"#;
    let transport = StubTransport::new()
        .json(Method::Get, "https://api.example.test/cards", 500, json!({}))
        .json(Method::Get, "https://api.example.test/health", 200, json!({"ok": true}));
    let records = run_yaml(&transport, yaml);

    assert_eq!(
        statuses(&records),
        vec![
            ("list", TestStatus::Failed),
            ("detail", TestStatus::Error),
            ("health", TestStatus::Passed),
        ]
    );
    assert!(matches!(
        record(&records, "detail").error(),
        Some(RunError::Resolve(ResolveError::DependencyUnsatisfied { test, .. })) if test == "list"
    ));
    // `detail` never reached the transport.
    assert_eq!(transport.call_count(), 2);
}

#[test]
fn transport_errors_and_bad_json_are_errors() {
    let yaml = r#"
- name: down
  request: {method: GET, endpoint: "https://api.example.test/down"}
  expected: {status: 200}
- name: html
  request: {method: GET, endpoint: "https://api.example.test/page"}
  expected:
    status: 200
    response:
      json:
        - key: title
          type: str
- name: plain
  request: {method: GET, endpoint: "https://api.example.test/page"}
  expected:
    status: 200
    response:
      type: text
      json:
        - key: ""
          contains: "<html>"
"#;
    let transport = StubTransport::new()
        .fail(
            Method::Get,
            "https://api.example.test/down",
            TransportError::Timeout("after 30s".to_string()),
        )
        .text(Method::Get, "https://api.example.test/page", 200, "<html></html>");
    let records = run_yaml(&transport, yaml);

    assert_eq!(
        statuses(&records),
        vec![
            ("down", TestStatus::Error),
            ("html", TestStatus::Error),
            ("plain", TestStatus::Passed),
        ]
    );
    assert!(matches!(
        records[0].error(),
        Some(RunError::Transport(TransportError::Timeout(_)))
    ));
    assert!(matches!(
        records[1].error(),
        Some(RunError::Transport(TransportError::Decode(_)))
    ));
    // The body was still captured for diagnosis.
    assert!(records[1].response().is_some());
}

#[test]
fn unexpected_status_wins_over_an_undecodable_body() {
    let yaml = r#"
- name: server error
  request: {method: GET, endpoint: "https://api.example.test/cards"}
  expected:
    status: 200
    response:
      type: json
      json:
        - key: cards
          type: list
- name: html with the right status
  request: {method: GET, endpoint: "https://api.example.test/page"}
  expected:
    status: 200
    response:
      json:
        - key: title
          type: str
"#;
    let transport = StubTransport::new()
        .text(
            Method::Get,
            "https://api.example.test/cards",
            500,
            "<html>Internal Server Error</html>",
        )
        .text(Method::Get, "https://api.example.test/page", 200, "<html></html>");
    let records = run_yaml(&transport, yaml);

    let failed = record(&records, "server error");
    assert_eq!(failed.status(), TestStatus::Failed);
    assert!(failed.error().is_none());
    assert_eq!(failed.failures().len(), 1);
    assert_eq!(failed.failures()[0].kind, FailureKind::StatusMismatch);
    assert!(failed.failure_reasons()[0].contains("500"));

    assert!(matches!(
        record(&records, "html with the right status").error(),
        Some(RunError::Transport(TransportError::Decode(_)))
    ));
}

#[test]
fn invalid_tests_are_reported_once_and_siblings_still_run() {
    let yaml = r#"
- name: bad verb
  request: {method: FETCH, endpoint: "https://api.example.test"}
  expected: {status: 200}
- name: unknown constant
  request: {method: GET, endpoint: "{{nowhere}}/x"}
  expected: {status: 200}
- name: dangling
  request:
    method: GET
    endpoint: "https://api.example.test/health"
    params: {x: {response_from: {name: ghost, key: id}}}
  expected: {status: 200}
- name: health
  request: {method: GET, endpoint: "https://api.example.test/health"}
  expected: {status: 200}
- name: health
  request: {method: GET, endpoint: "https://api.example.test/health"}
  expected: {status: 200}
"#;
    let transport =
        StubTransport::new().json(Method::Get, "https://api.example.test/health", 200, json!({}));
    let records = run_yaml(&transport, yaml);

    assert_eq!(records.len(), 5);
    let errors: Vec<_> = records.iter().map(|record| record.error().cloned()).collect();
    assert!(matches!(
        &errors[0],
        Some(RunError::Spec(SpecError::InvalidRequestSpec { .. }))
    ));
    assert!(matches!(
        &errors[1],
        Some(RunError::Spec(SpecError::UnknownConstant { name })) if name == "nowhere"
    ));
    assert!(matches!(
        &errors[2],
        Some(RunError::Spec(SpecError::MissingDependency { target })) if target == "ghost"
    ));
    assert_eq!(records[3].status(), TestStatus::Passed);
    assert!(matches!(
        &errors[4],
        Some(RunError::Spec(SpecError::DuplicateTest { .. }))
    ));
    assert_eq!(transport.call_count(), 1);
}

#[test]
fn cancellation_records_remaining_tests() {
    let suite = parse_str(LOTUS_SUITE).unwrap();
    let transport = StubTransport::new();
    let orchestrator = Orchestrator::new(&transport);
    orchestrator
        .cancel_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let records = orchestrator.run(&suite);
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0].error(), Some(RunError::Cancelled)));
    assert_eq!(transport.call_count(), 0);
}

/// Raises the cancel flag while the first request is in flight, the way an
/// interrupt handler would.
struct InterruptDuringFirstCall {
    inner: StubTransport,
    cancel: Arc<AtomicBool>,
}

impl Transport for InterruptDuringFirstCall {
    fn send(
        &self,
        request: &ConcreteRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        self.cancel.store(true, Ordering::SeqCst);
        self.inner.send(request, timeout)
    }
}

#[test]
fn interrupt_finishes_the_current_test_and_cancels_the_rest() {
    let yaml = r#"
- name: first
  request: {method: GET, endpoint: "https://api.example.test/health"}
  expected: {status: 200}
- name: second
  request: {method: GET, endpoint: "https://api.example.test/health"}
  expected: {status: 200}
- name: third
  request: {method: GET, endpoint: "https://api.example.test/health"}
  expected: {status: 200}
"#;
    let cancel = Arc::new(AtomicBool::new(false));
    let transport = InterruptDuringFirstCall {
        inner: StubTransport::new().json(
            Method::Get,
            "https://api.example.test/health",
            200,
            json!({"ok": true}),
        ),
        cancel: Arc::clone(&cancel),
    };
    let suite = parse_str(yaml).unwrap();
    let records = Orchestrator::new(&transport)
        .with_cancel_flag(cancel)
        .run(&suite);

    assert_eq!(
        statuses(&records),
        vec![
            ("first", TestStatus::Passed),
            ("second", TestStatus::Error),
            ("third", TestStatus::Error),
        ]
    );
    assert!(matches!(records[2].error(), Some(RunError::Cancelled)));
    assert_eq!(transport.inner.call_count(), 1);
}

#[test]
fn reruns_against_a_stable_backend_are_identical() {
    let transport = StubTransport::new().json(
        Method::Get,
        &format!("{BASE}/cards?name=Black+Lotus"),
        200,
        lotus_body(),
    );
    let first = run_yaml(&transport, LOTUS_SUITE);
    let second = run_yaml(&transport, LOTUS_SUITE);

    assert_eq!(statuses(&first), statuses(&second));
    assert_eq!(first[0].failures(), second[0].failures());
    assert_eq!(
        first[0].response().map(|response| &response.body),
        second[0].response().map(|response| &response.body)
    );
}
