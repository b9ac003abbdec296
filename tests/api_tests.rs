// tests/api_tests.rs

use std::sync::Arc;

use entrance_quiz::{
    config::Config,
    engine::{QuizEngine, QuizSettings},
    models::question::{AnswerOption, Question},
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use serde_json::Value;

const SECRET: &str = "test_secret_for_integration_tests";

fn question(id: i64) -> Question {
    Question {
        id,
        category_id: Some(id % 3),
        text: format!("Which colour does flag {id} show?"),
        option_a: "Yellow".to_string(),
        option_b: "Red".to_string(),
        option_c: Some("Blue".to_string()),
        option_d: Some("Black".to_string()),
        correct: AnswerOption::A,
        is_active: true,
        eligible_for_quiz: false,
        eligible_for_exam: true,
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app(questions: Vec<Question>) -> String {
    // 1. In-memory store in place of Postgres
    let store = Arc::new(MemoryStore::with_questions(questions));

    // 2. Create test configuration and state
    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        quiz: QuizSettings::default(),
    };
    let engine = QuizEngine::new(store.clone(), store, config.quiz.clone());

    let state = AppState {
        engine: Arc::new(engine),
        config,
    };

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn token(candidate_id: i64, role: &str) -> String {
    sign_jwt(candidate_id, role, SECRET, 600).expect("Failed to sign token")
}

async fn begin(client: &reqwest::Client, address: &str, token: &str) -> (u16, Value) {
    let response = client
        .post(format!("{}/api/quiz/begin", address))
        .bearer_auth(token)
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app(Vec::new()).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn quiz_requires_token() {
    let address = spawn_app((1..=5).map(question).collect()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/quiz/status", address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/quiz/status", address))
        .bearer_auth("not-a-token")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn begin_without_questions_is_unavailable() {
    let address = spawn_app(Vec::new()).await;
    let client = reqwest::Client::new();
    let token = token(100001, "candidate");

    let (status, body) = begin(&client, &address, &token).await;
    assert_eq!(status, 503);
    assert!(body["error"].is_string());

    let status: Value = client
        .get(format!("{}/api/quiz/status", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["available"], false);
}

#[tokio::test]
async fn full_quiz_flow() {
    // Arrange
    let address = spawn_app((1..=25).map(question).collect()).await;
    let client = reqwest::Client::new();
    let token = token(100002, "candidate");

    // Begin twice: the second call continues the same attempt
    let (status, first) = begin(&client, &address, &token).await;
    assert_eq!(status, 201);
    assert_eq!(first["created"], true);
    let attempt_id = first["attempt"]["attempt_id"].as_i64().unwrap();

    let (status, second) = begin(&client, &address, &token).await;
    assert_eq!(status, 200);
    assert_eq!(second["attempt"]["attempt_id"].as_i64().unwrap(), attempt_id);

    // Result is not there yet
    let response = client
        .get(format!("{}/api/quiz/attempts/{}/result", address, attempt_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // A malformed choice skips the question
    let question: Value = client
        .get(format!("{}/api/quiz/attempts/{}/question", address, attempt_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(question["number"], 1);
    assert_eq!(question["target_count"], 20);
    assert!(question["question"].get("correct").is_none());

    let skipped: Value = client
        .post(format!("{}/api/quiz/attempts/{}/answer", address, attempt_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "choice": "E" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(skipped["outcome"], "next_question");
    assert_eq!(skipped["number"], 1);
    assert_ne!(skipped["slot_id"], question["slot_id"]);

    // Answer everything correctly
    let mut last = Value::Null;
    for _ in 0..20 {
        last = client
            .post(format!("{}/api/quiz/attempts/{}/answer", address, attempt_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "choice": "A" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    }
    assert_eq!(last["outcome"], "finished");
    assert_eq!(last["correct_count"], 20);
    assert_eq!(last["passed"], true);
    assert_eq!(last["qualification"]["valid"], true);

    // Finished attempts refuse further answers
    let response = client
        .post(format!("{}/api/quiz/attempts/{}/answer", address, attempt_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "choice": "A" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    let result: Value = client
        .get(format!("{}/api/quiz/attempts/{}/result", address, attempt_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["total"], 20);

    let qualification: Value = client
        .get(format!("{}/api/qualification", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(qualification["valid"], true);
    assert!(qualification["days_remaining"].as_i64().unwrap() >= 364);
}

#[tokio::test]
async fn attempts_of_other_candidates_are_hidden() {
    let address = spawn_app((1..=25).map(question).collect()).await;
    let client = reqwest::Client::new();

    let (_, body) = begin(&client, &address, &token(100003, "candidate")).await;
    let attempt_id = body["attempt"]["attempt_id"].as_i64().unwrap();

    let response = client
        .get(format!("{}/api/quiz/attempts/{}/question", address, attempt_id))
        .bearer_auth(token(100004, "candidate"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn statistics_require_admin() {
    let address = spawn_app((1..=25).map(question).collect()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/admin/quiz/stats/attempts", address))
        .bearer_auth(token(100005, "candidate"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    begin(&client, &address, &token(100005, "candidate")).await;

    let admin = token(1, "admin");
    let stats: Value = client
        .get(format!("{}/api/admin/quiz/stats/attempts", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["started"], 1);
    assert_eq!(stats["completed"], 0);

    let answers: Value = client
        .get(format!("{}/api/admin/quiz/stats/answers", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(answers["questions"].as_array().unwrap().len(), 25);

    let response = client
        .get(format!("{}/api/admin/quiz/stats/failed?limit=0", address))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn unusable_submissions_are_skips() {
    let address = spawn_app((1..=25).map(question).collect()).await;
    let client = reqwest::Client::new();
    let token = token(100006, "candidate");

    let (_, body) = begin(&client, &address, &token).await;
    let attempt_id = body["attempt"]["attempt_id"].as_i64().unwrap();
    let url = format!("{}/api/quiz/attempts/{}/answer", address, attempt_id);

    // An overlong choice
    let response = client
        .post(&url)
        .bearer_auth(&token)
        .json(&serde_json::json!({ "choice": "X".repeat(40) }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["outcome"], "next_question");

    // No body at all
    let response = client
        .post(&url)
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["outcome"], "next_question");
    assert_eq!(outcome["number"], 1);

    let status: Value = client
        .get(format!("{}/api/quiz/status", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["latest_attempt"]["answered_count"], 0);
}
