//! End-to-end flow through the service: send, record, bounce.

mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{provider_config, sandbox_config, spawn_provider, spawn_service, Reply};

fn bounce(id: i64, message_id: &str, email: &str, description: &str) -> Value {
    json!({
        "ID": id,
        "Type": "HardBounce",
        "Name": "Hard bounce",
        "Tag": "Test",
        "MessageID": message_id,
        "Description": description,
        "TypeCode": 1,
        "Details": "Test bounce details",
        "Email": email,
        "BouncedAt": "2011-05-23T11:16:00.3018994+01:00",
        "DumpAvailable": true,
        "Inactive": true,
        "CanActivate": true,
        "Content": null,
        "Subject": null
    })
}

fn outgoing() -> Value {
    json!([{
        "from": "sender@example.com",
        "to": ["a@example.com", "b@example.com"],
        "cc": ["c@example.com"],
        "subject": "Welcome",
        "body": "Hello",
        "headers": [["Tag", "welcome"], ["X-Campaign", "spring"]]
    }])
}

#[tokio::test]
async fn test_send_records_one_delivery_per_recipient() {
    let (addr, _recorded) = spawn_provider(Reply::Accept).await;
    let service = spawn_service(provider_config(addr)).await;

    let response = service
        .client
        .post(service.url("/send"))
        .json(&outgoing())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sent"], 1);

    service.wait_for_deliveries(3).await;

    let listed: Vec<Value> = service
        .client
        .get(service.url("/messages?tag=welcome"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut recipients: Vec<(String, String)> = listed
        .iter()
        .map(|r| {
            (
                r["to"].as_str().unwrap().to_string(),
                r["to_type"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    recipients.sort();
    assert_eq!(
        recipients,
        vec![
            ("a@example.com".to_string(), "to".to_string()),
            ("b@example.com".to_string(), "to".to_string()),
            ("c@example.com".to_string(), "cc".to_string()),
        ]
    );
    assert!(listed.iter().all(|r| r["message_id"] == "msg-1"));
    assert!(listed
        .iter()
        .all(|r| r["submitted_at"] == "2011-05-23T06:38:26.311500Z"));
}

#[tokio::test]
async fn test_duplicate_bounce_creates_one_record() {
    let (addr, _recorded) = spawn_provider(Reply::Accept).await;
    let service = spawn_service(provider_config(addr)).await;

    service
        .client
        .post(service.url("/send"))
        .json(&outgoing())
        .send()
        .await
        .unwrap();
    service.wait_for_deliveries(3).await;

    for description in ["first delivery", "second delivery"] {
        let response = service
            .client
            .post(service.url("/bounce"))
            .json(&bounce(42, "msg-1", "b@example.com", description))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    assert_eq!(service.store.bounce_count().await.unwrap(), 1);

    let delivery = service
        .store
        .find_delivery("msg-1", "b@example.com")
        .await
        .unwrap()
        .unwrap();
    let bounces = service.store.bounces_for(delivery.id).await.unwrap();
    assert_eq!(bounces.len(), 1);
    assert_eq!(bounces[0].bounce_id, 42);
    assert_eq!(bounces[0].description, "first delivery");
    assert_eq!(
        bounces[0].bounced_at.to_rfc3339(),
        "2011-05-23T10:16:00.301899+00:00"
    );

    let listed: Vec<Value> = service
        .client
        .get(service.url("/messages?q=b@example"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["bounces"][0]["type"], "HardBounce");
}

#[tokio::test]
async fn test_bounce_for_unknown_delivery_is_not_found() {
    let service = spawn_service(sandbox_config()).await;

    let response = service
        .client
        .post(service.url("/bounce"))
        .json(&bounce(7, "missing", "nobody@example.com", "x"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(service.store.bounce_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bounce_with_malformed_timestamp_is_rejected() {
    let service = spawn_service(sandbox_config()).await;
    let mut payload = bounce(8, "missing", "nobody@example.com", "x");
    payload["BouncedAt"] = json!("2011-05-23 11:16");

    let response = service
        .client
        .post(service.url("/bounce"))
        .json(&payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(service.store.bounce_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bounce_endpoint_rejects_other_methods() {
    let service = spawn_service(sandbox_config()).await;

    let response = service
        .client
        .get(service.url("/bounce"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_sandbox_send_records_and_links_bounce() {
    let service = spawn_service(sandbox_config()).await;

    let response = service
        .client
        .post(service.url("/send"))
        .json(&outgoing())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sent"], 1);

    service.wait_for_deliveries(3).await;

    let listed: Vec<Value> = service
        .client
        .get(service.url("/messages?to_type=cc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["status"], "Test job accepted");
    let message_id = listed[0]["message_id"].as_str().unwrap().to_string();

    let response = service
        .client
        .post(service.url("/bounce"))
        .json(&bounce(9, &message_id, "C@example.com", "soft"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.store.bounce_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_send_surfaces_provider_rejection() {
    let body = r#"{"ErrorCode": 300, "Message": "Invalid sender"}"#.to_string();
    let (addr, _recorded) = spawn_provider(Reply::Status(422, body)).await;
    let service = spawn_service(provider_config(addr)).await;

    let response = service
        .client
        .post(service.url("/send"))
        .json(&outgoing())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("Invalid sender"));
    assert_eq!(service.store.delivery_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_send_reports_rejected_token_as_bad_gateway() {
    let body = r#"{"ErrorCode": 10, "Message": "Bad or missing API token"}"#.to_string();
    let (addr, _recorded) = spawn_provider(Reply::Status(401, body)).await;
    let service = spawn_service(provider_config(addr)).await;

    let response = service
        .client
        .post(service.url("/send"))
        .json(&outgoing())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(service.store.delivery_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_later_batch_failure_keeps_earlier_deliveries() {
    let (addr, recorded) =
        spawn_provider(Reply::FailAfter { accepted: 1, status: 500 }).await;
    let mut config = provider_config(addr);
    config.batch_size = 2;
    let service = spawn_service(config).await;

    let messages: Vec<Value> = (0..3)
        .map(|i| {
            json!({
                "from": "sender@example.com",
                "to": [format!("user{}@example.com", i)],
                "subject": "Batch",
                "body": "Hello"
            })
        })
        .collect();

    let response = service
        .client
        .post(service.url("/send"))
        .json(&messages)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(recorded.batch_sizes(), vec![2, 1]);

    service.wait_for_deliveries(2).await;
    assert!(service
        .store
        .find_delivery("msg-2", "user1@example.com")
        .await
        .unwrap()
        .is_some());
    assert!(service
        .store
        .find_delivery("msg-3", "user2@example.com")
        .await
        .unwrap()
        .is_none());
}
