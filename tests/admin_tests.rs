// tests/admin_tests.rs

mod common;

use chrono::{Duration, Utc};
use common::spawn_app;
use licencia_backend::{models::user::Role, store::Store};
use serde_json::{Value, json};

#[tokio::test]
async fn admin_question_crud() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role(Role::Admin).await;

    let res = app
        .post(
            "/api/admin/questions",
            &admin,
            json!({
                "category": "b1",
                "text": "What does a red light mean? <script>alert(1)</script>",
                "options": ["Stop", "Go", "Speed up"],
                "correct_answer": 0
            }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 201);
    let question: Value = res.json().await.unwrap();
    assert_eq!(question["category"], "B1");
    assert!(!question["text"].as_str().unwrap().contains("<script>"));
    let id = question["id"].as_i64().unwrap();

    let bad_index = app
        .post(
            "/api/admin/questions",
            &admin,
            json!({ "category": "B1", "text": "Q", "options": ["a", "b"], "correct_answer": 2 }),
        )
        .await;
    assert_eq!(bad_index.status().as_u16(), 400);

    let res = app
        .put(&format!("/api/admin/questions/{}", id), &admin, json!({ "correct_answer": 1 }))
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["correct_answer"], 1);

    let shrink = app
        .put(&format!("/api/admin/questions/{}", id), &admin, json!({ "options": ["x", "y"], "correct_answer": 2 }))
        .await;
    assert_eq!(shrink.status().as_u16(), 400);

    let listed: Vec<Value> = app.get("/api/admin/questions?category=B1", &admin).await.json().await.unwrap();
    assert_eq!(listed.len(), 1);

    let res = app.delete(&format!("/api/admin/questions/{}", id), &admin).await;
    assert_eq!(res.status().as_u16(), 204);
    let res = app.delete(&format!("/api/admin/questions/{}", id), &admin).await;
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn tenant_admin_is_scoped_to_its_company() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role(Role::Admin).await;
    let (_, tenant_admin) = app.user_with_role(Role::AdminSupertaxis).await;

    // A tenant admin's evaluations land in its tenant whatever the payload says.
    let res = app
        .post(
            "/api/admin/evaluations",
            &tenant_admin,
            json!({ "name": "Fleet", "duration_minutes": 15, "question_count": 5, "company_tag": "othercorp" }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 201);
    let own: Value = res.json().await.unwrap();
    assert_eq!(own["company_tag"], "supertaxis");
    assert_eq!(own["is_active"], true);

    let public: Value = app
        .post(
            "/api/admin/evaluations",
            &admin,
            json!({ "name": "Public", "duration_minutes": 15, "question_count": 5 }),
        )
        .await
        .json()
        .await
        .unwrap();

    let visible: Vec<Value> = app.get("/api/admin/evaluations", &tenant_admin).await.json().await.unwrap();
    assert_eq!(visible.len(), 1);
    let visible: Vec<Value> = app.get("/api/admin/evaluations", &admin).await.json().await.unwrap();
    assert_eq!(visible.len(), 2);

    let res = app
        .put(&format!("/api/admin/evaluations/{}", public["id"]), &tenant_admin, json!({ "is_active": false }))
        .await;
    assert_eq!(res.status().as_u16(), 403);

    // Questions follow the evaluation's tenant; the standard bank is off limits.
    let res = app
        .post(
            "/api/admin/questions",
            &tenant_admin,
            json!({ "category": own["id"].to_string(), "text": "Q", "options": ["a", "b"], "correct_answer": 0 }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 201);
    let q: Value = res.json().await.unwrap();
    assert_eq!(q["evaluation_id"], own["id"]);

    let res = app
        .post(
            "/api/admin/questions",
            &tenant_admin,
            json!({ "category": "A2", "text": "Q", "options": ["a", "b"], "correct_answer": 0 }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 403);

    let res = app
        .post(
            "/api/admin/questions",
            &tenant_admin,
            json!({ "category": public["id"].to_string(), "text": "Q", "options": ["a", "b"], "correct_answer": 0 }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 403);

    // Deleting the evaluation takes its questions along.
    let res = app.delete(&format!("/api/admin/evaluations/{}", own["id"]), &tenant_admin).await;
    assert_eq!(res.status().as_u16(), 204);
    assert!(app.store.find_question(q["id"].as_i64().unwrap()).await.unwrap().is_none());
}

#[tokio::test]
async fn user_management() {
    let app = spawn_app().await;
    let (admin_id, admin) = app.user_with_role(Role::Admin).await;
    let (_, tenant_admin) = app.user_with_role(Role::AdminSupertaxis).await;
    let (user_id, user_token) = app.register_and_login().await;
    let (driver_id, _) = app.user_with_role(Role::Supertaxis).await;

    let all: Vec<Value> = app.get("/api/admin/users", &admin).await.json().await.unwrap();
    assert_eq!(all.len(), 4);
    let tenant: Vec<Value> = app.get("/api/admin/users", &tenant_admin).await.json().await.unwrap();
    assert_eq!(tenant.len(), 2);
    assert!(tenant.iter().all(|u| u["role"] != "user" && u["role"] != "admin"));

    // Plain users never reach the admin surface.
    assert_eq!(app.get("/api/admin/users", &user_token).await.status().as_u16(), 403);

    let res = app
        .put(&format!("/api/admin/users/{}", user_id), &tenant_admin, json!({ "role": "supertaxis" }))
        .await;
    assert_eq!(res.status().as_u16(), 403);

    let res = app
        .put(&format!("/api/admin/users/{}", driver_id), &tenant_admin, json!({ "role": "admin" }))
        .await;
    assert_eq!(res.status().as_u16(), 403);

    let res = app
        .put(&format!("/api/admin/users/{}", user_id), &admin, json!({ "role": "supertaxis", "name": "Renamed" }))
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["role"], "supertaxis");
    assert_eq!(updated["name"], "Renamed");

    let res = app
        .put(&format!("/api/admin/users/{}", user_id), &admin, json!({ "role": "emperor" }))
        .await;
    assert_eq!(res.status().as_u16(), 400);

    let res = app.delete(&format!("/api/admin/users/{}", admin_id), &admin).await;
    assert_eq!(res.status().as_u16(), 400);

    let res = app.delete(&format!("/api/admin/users/{}", driver_id), &admin).await;
    assert_eq!(res.status().as_u16(), 204);
    assert!(app.store.find_user(driver_id).await.unwrap().is_none());
}

#[tokio::test]
async fn manual_grant_and_revoke() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role(Role::Admin).await;
    let (user_id, _) = app.register_and_login().await;

    let res = app
        .post(&format!("/api/admin/users/{}/pro", user_id), &admin, json!({ "days": 30 }))
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let user = app.store.find_user(user_id).await.unwrap().unwrap();
    assert!(user.is_pro);
    let expires = user.pro_expires_at.unwrap();
    assert!(expires > Utc::now() + Duration::days(29));
    assert!(expires <= Utc::now() + Duration::days(30));

    let res = app
        .post(&format!("/api/admin/users/{}/pro", user_id), &admin, json!({}))
        .await;
    assert_eq!(res.status().as_u16(), 200);
    let user = app.store.find_user(user_id).await.unwrap().unwrap();
    assert!(user.pro_expires_at.unwrap() > Utc::now() + Duration::days(119));

    // No body at all also means the configured period.
    app.delete(&format!("/api/admin/users/{}/pro", user_id), &admin).await;
    let res = app
        .client
        .post(app.url(&format!("/api/admin/users/{}/pro", user_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let user = app.store.find_user(user_id).await.unwrap().unwrap();
    assert!(user.is_pro);
    assert!(user.pro_expires_at.unwrap() > Utc::now() + Duration::days(119));

    let res = app.delete(&format!("/api/admin/users/{}/pro", user_id), &admin).await;
    assert_eq!(res.status().as_u16(), 200);
    assert!(!app.store.find_user(user_id).await.unwrap().unwrap().is_pro);

    let res = app.post("/api/admin/users/999999/pro", &admin, json!({})).await;
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn listing_users_sweeps_expired_grants() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role(Role::Admin).await;
    let (lapsed, _) = app.register_and_login().await;
    let (active, _) = app.register_and_login().await;

    app.store
        .set_pro(lapsed, true, Some(Utc::now() - Duration::hours(1)))
        .await
        .unwrap();
    app.store
        .set_pro(active, true, Some(Utc::now() + Duration::days(10)))
        .await
        .unwrap();

    let users: Vec<Value> = app.get("/api/admin/users", &admin).await.json().await.unwrap();
    let pro_of = |id: i64| {
        users
            .iter()
            .find(|u| u["id"].as_i64() == Some(id))
            .map(|u| u["is_pro"].clone())
            .unwrap()
    };
    assert_eq!(pro_of(lapsed), false);
    assert_eq!(pro_of(active), true);

    // The sweep is persisted, not only hidden in the response.
    assert!(!app.store.find_user(lapsed).await.unwrap().unwrap().is_pro);
}

#[tokio::test]
async fn pro_price_setting() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role(Role::Admin).await;
    let (_, tenant_admin) = app.user_with_role(Role::AdminSupertaxis).await;

    let res = app
        .put("/api/admin/settings/pro-price", &admin, json!({ "pro_price_cop": 25_000 }))
        .await;
    assert_eq!(res.status().as_u16(), 200);

    let price: Value = app.get("/api/admin/settings/pro-price", &admin).await.json().await.unwrap();
    assert_eq!(price["pro_price_cop"], 25_000);

    let res = app
        .put("/api/admin/settings/pro-price", &tenant_admin, json!({ "pro_price_cop": 1 }))
        .await;
    assert_eq!(res.status().as_u16(), 403);

    let res = app
        .put("/api/admin/settings/pro-price", &admin, json!({ "pro_price_cop": 0 }))
        .await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn admin_sees_all_results_and_payments() {
    let app = spawn_app().await;
    app.seed_questions("A2", None, 15).await;
    let (_, admin) = app.user_with_role(Role::Admin).await;
    let (user_id, token) = app.register_and_login().await;

    let session: Value = app
        .post("/api/exams/start", &token, json!({ "category": "A2" }))
        .await
        .json()
        .await
        .unwrap();
    let body: Value = app
        .post(&format!("/api/exams/{}/submit", session["id"]), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();

    let results: Vec<Value> = app
        .get(&format!("/api/admin/results?user_id={}", user_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    // Admins may open any user's result.
    let res = app.get(&format!("/api/results/{}", body["result"]["id"]), &admin).await;
    assert_eq!(res.status().as_u16(), 200);

    let payments: Vec<Value> = app.get("/api/admin/payments", &admin).await.json().await.unwrap();
    assert!(payments.is_empty());
}
