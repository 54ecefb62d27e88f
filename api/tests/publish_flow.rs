mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use postonce_api::domain::ContentStatus;
use postonce_api::events::Event;
use postonce_api::store::ContentStore;
use serde_json::{Value, json};

fn thread(units: &[(&str, &str)]) -> Value {
    let post: Vec<Value> = units
        .iter()
        .map(|(post_type, text)| json!({ "post_type": post_type, "post_content": text }))
        .collect();
    json!({
        "provider": "twitter",
        "type": "thread",
        "content": [{ "post_number": 1, "post": post }]
    })
}

fn linkedin_post(text: &str) -> Value {
    json!({
        "provider": "linkedin",
        "type": "long_form_post",
        "content": [{ "post_number": 1, "post": [{ "post_content": text }] }]
    })
}

async fn create(app: &TestApp, account_id: i64, integration_id: i64, generated: Value) -> i64 {
    let resp = app
        .post(
            &format!("/accounts/{}/content", account_id),
            Some(json!({ "integration_id": integration_id, "generated_content": generated })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{:?}", String::from_utf8_lossy(&resp.body));
    resp.json()["id"].as_i64().expect("content id")
}

fn push_refresh(app: &TestApp, access: &str, refresh: &str) {
    app.http.push_json(
        200,
        json!({ "access_token": access, "refresh_token": refresh, "expires_in": 7200 }),
    );
}

fn push_tweet(app: &TestApp, id: &str) {
    app.http.push_json(201, json!({ "data": { "id": id, "text": "" } }));
}

#[tokio::test]
async fn thread_posts_reply_chain_then_quote() {
    let mut app = TestApp::new();
    let integration = app.connect_twitter(7).await;
    let id = create(
        &app,
        7,
        integration.id,
        thread(&[("normal", "A"), ("normal", "B"), ("quote_tweet", "C")]),
    )
    .await;
    app.drain_events();

    push_refresh(&app, "fresh-bearer", "refresh-2");
    push_tweet(&app, "1001");
    push_tweet(&app, "1002");
    push_tweet(&app, "1003");

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "posted");
    assert_eq!(body["posted_url"], "https://x.com/postonce_dev/status/1001");
    assert_eq!(body["posted_units"].as_array().map(Vec::len), Some(3));

    let requests = app.http.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(app.http.pending(), 0);

    assert_eq!(requests[0].form_value("grant_type"), Some("refresh_token"));
    assert_eq!(requests[0].form_value("refresh_token"), Some("refresh-1"));

    for tweet in &requests[1..] {
        assert!(tweet.url.ends_with("/2/tweets"));
        assert_eq!(tweet.header_value("authorization"), Some("Bearer fresh-bearer"));
    }
    assert_eq!(requests[1].json_body(), Some(&json!({ "text": "A" })));
    assert_eq!(
        requests[2].json_body(),
        Some(&json!({ "text": "B", "reply": { "in_reply_to_tweet_id": "1001" } }))
    );
    assert_eq!(
        requests[3].json_body(),
        Some(&json!({ "text": "C", "quote_tweet_id": "1001" }))
    );

    let events = app.drain_events();
    assert!(events.contains(&Event::ContentPublished {
        account_id: 7,
        content_id: id,
        provider: postonce_api::domain::Provider::Twitter,
        posted_url: Some("https://x.com/postonce_dev/status/1001".to_string()),
    }));
    assert!(events.contains(&Event::ContentListStale { account_id: 7 }));
}

#[tokio::test]
async fn quote_only_thread_posts_nothing() {
    let app = TestApp::new();
    let integration = app.connect_twitter(7).await;
    let id = create(&app, 7, integration.id, thread(&[("quote_tweet", "C")])).await;

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["kind"], "validation_error");
    assert_eq!(app.http.request_count(), 0);

    let content = app.store.get_content(7, id).await.unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::Generated);
}

#[tokio::test]
async fn single_tweet_refreshes_before_posting() {
    let app = TestApp::new();
    let integration = app.connect_twitter(7).await;
    let id = create(
        &app,
        7,
        integration.id,
        json!({
            "provider": "twitter",
            "type": "tweet",
            "content": [{ "post_number": 1, "post": [{ "post_content": "hello" }] }]
        }),
    )
    .await;

    push_refresh(&app, "fresh-bearer", "refresh-2");
    push_tweet(&app, "555");

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.json()["posted_url"], "https://x.com/postonce_dev/status/555");

    let requests = app.http.requests();
    assert!(requests[0].url.ends_with("/2/oauth2/token"));
    assert!(requests[1].url.ends_with("/2/tweets"));
    assert_eq!(requests[1].header_value("Authorization"), Some("Bearer fresh-bearer"));
}

#[tokio::test]
async fn refresh_failure_is_a_credential_error() {
    let mut app = TestApp::new();
    let integration = app.connect_twitter(7).await;
    let id = create(&app, 7, integration.id, thread(&[("normal", "A")])).await;
    app.drain_events();

    app.http.push(400, "{\"error\":\"invalid_request\"}");

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json()["error"], "failed to post, try again");
    assert_eq!(app.http.request_count(), 1);

    let content = app.store.get_content(7, id).await.unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::Generated);

    match app.drain_events().first() {
        Some(Event::ContentPublishFailed { kind, posted_units, .. }) => {
            assert_eq!(*kind, "credential_error");
            assert_eq!(*posted_units, 0);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn failed_thread_resumes_without_reposting() {
    let app = TestApp::new();
    let integration = app.connect_twitter(7).await;
    let id = create(
        &app,
        7,
        integration.id,
        thread(&[("normal", "A"), ("normal", "B"), ("quote_tweet", "C")]),
    )
    .await;

    push_refresh(&app, "bearer-2", "refresh-2");
    push_tweet(&app, "1001");
    app.http.push(503, "{\"title\":\"Service Unavailable\"}");

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);

    let content = app.store.get_content(7, id).await.unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::PartialFailed);
    assert_eq!(content.posted_units.0.len(), 1);
    assert_eq!(content.posted_units.0[0].provider_id, "1001");

    push_refresh(&app, "bearer-3", "refresh-3");
    push_tweet(&app, "1002");
    push_tweet(&app, "1003");

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["posted_url"], "https://x.com/postonce_dev/status/1001");

    let requests = app.http.requests();
    let retry = &requests[3..];
    assert_eq!(retry.len(), 3);
    assert_eq!(retry[0].form_value("refresh_token"), Some("refresh-2"));
    assert_eq!(
        retry[1].json_body(),
        Some(&json!({ "text": "B", "reply": { "in_reply_to_tweet_id": "1001" } }))
    );
    assert_eq!(
        retry[2].json_body(),
        Some(&json!({ "text": "C", "quote_tweet_id": "1001" }))
    );
}

#[tokio::test]
async fn linkedin_publish_posts_ugc_share() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("Shipping today")).await;

    app.http.push_json(201, json!({ "id": "urn:li:share:7000" }));

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json()["posted_url"],
        "https://www.linkedin.com/feed/update/urn:li:share:7000"
    );

    let requests = app.http.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("/v2/ugcPosts"));
    assert_eq!(requests[0].header_value("X-Restli-Protocol-Version"), Some("2.0.0"));
    assert_eq!(requests[0].header_value("Authorization"), Some("Bearer li-bearer"));
    let body = requests[0].json_body().expect("json body");
    assert_eq!(body["author"], "urn:li:person:abc123");
    assert_eq!(
        body["specificContent"]["com.linkedin.ugc.ShareContent"]["shareCommentary"]["text"],
        "Shipping today"
    );
}

#[tokio::test]
async fn edited_content_is_what_gets_published() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("draft")).await;

    let resp = app
        .put(&format!("/accounts/7/content/{}", id), linkedin_post("final words"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json()["edited_content"]["content"][0]["post"][0]["post_content"],
        "final words"
    );

    app.http.push_json(201, json!({ "id": "urn:li:share:1" }));
    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = app.http.requests()[0].json_body().cloned().expect("json body");
    assert_eq!(
        body["specificContent"]["com.linkedin.ugc.ShareContent"]["shareCommentary"]["text"],
        "final words"
    );

    let resp = app
        .put(&format!("/accounts/7/content/{}", id), linkedin_post("too late"))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn edit_must_match_schema_and_provider() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("draft")).await;

    let resp = app
        .put(&format!("/accounts/7/content/{}", id), json!({ "provider": "linkedin" }))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .put(&format!("/accounts/7/content/{}", id), thread(&[("normal", "A")]))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn linkedin_thread_is_marked_posted_without_a_link() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(
        &app,
        7,
        integration.id,
        json!({
            "provider": "linkedin",
            "type": "thread",
            "content": [{ "post_number": 1, "post": [{ "post_content": "one" }] }]
        }),
    )
    .await;

    let resp = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "posted");
    assert!(body["posted_url"].is_null());
    assert_eq!(app.http.request_count(), 0);
}

#[tokio::test]
async fn publishing_twice_conflicts() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("once")).await;

    app.http.push_json(201, json!({ "id": "urn:li:share:1" }));
    let first = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app.post(&format!("/accounts/7/content/{}/publish", id), None).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(app.http.request_count(), 1);
}

#[tokio::test]
async fn content_of_another_tenant_is_not_found() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("mine")).await;

    let resp = app.post(&format!("/accounts/8/content/{}/publish", id), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .post(
            "/accounts/8/content",
            Some(json!({ "integration_id": integration.id, "generated_content": linkedin_post("x") })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_provider_mismatch() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;

    let resp = app
        .post(
            "/accounts/7/content",
            Some(json!({ "integration_id": integration.id, "generated_content": thread(&[("normal", "A")]) })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["kind"], "validation_error");
}

#[tokio::test]
async fn schedule_and_unschedule() {
    let mut app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("later")).await;
    app.drain_events();

    let past = Utc::now() - Duration::hours(1);
    let resp = app
        .post(
            &format!("/accounts/7/content/{}/schedule", id),
            Some(json!({ "scheduled_at": past })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let at = Utc::now() + Duration::days(1);
    let resp = app
        .post(
            &format!("/accounts/7/content/{}/schedule", id),
            Some(json!({ "scheduled_at": at })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "scheduled");

    let resp = app
        .post(
            &format!("/accounts/7/content/{}/schedule", id),
            Some(json!({ "scheduled_at": at })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = app.get("/accounts/7/content?status=scheduled").await;
    assert_eq!(resp.json().as_array().map(Vec::len), Some(1));

    let resp = app.delete(&format!("/accounts/7/content/{}/schedule", id)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "generated");
    assert!(body["scheduled_at"].is_null());

    let resp = app.delete(&format!("/accounts/7/content/{}/schedule", id)).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    assert_eq!(
        app.drain_events(),
        vec![
            Event::ContentScheduled { account_id: 7, content_id: id },
            Event::ContentListStale { account_id: 7 },
            Event::ContentUnscheduled { account_id: 7, content_id: id },
            Event::ContentListStale { account_id: 7 },
        ]
    );
}

#[tokio::test]
async fn list_rejects_unknown_status() {
    let app = TestApp::new();
    let resp = app.get("/accounts/7/content?status=archived").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app.get("/accounts/7/content").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json(), json!([]));
}

#[tokio::test]
async fn deleting_integration_removes_its_content() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    create(&app, 7, integration.id, linkedin_post("gone soon")).await;

    let resp = app
        .delete(&format!("/accounts/7/integrations/{}", integration.id))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get("/accounts/7/content").await;
    assert_eq!(resp.json(), json!([]));
}

#[tokio::test]
async fn storage_failure_outside_publish_is_not_reported_as_a_post_failure() {
    let app = TestApp::new();
    let integration = app.connect_linkedin(7).await;
    let id = create(&app, 7, integration.id, linkedin_post("later")).await;

    app.store.fail_writes(true);
    let resp = app
        .post(
            &format!("/accounts/7/content/{}/schedule", id),
            Some(json!({ "scheduled_at": Utc::now() + Duration::days(1) })),
        )
        .await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.json();
    assert_eq!(body["kind"], "persistence_error");
    assert_eq!(body["error"], "internal error");
}
