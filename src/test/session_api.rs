#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use crate::test::utils::{create_standard_test_db, login_test_user, setup_test_client};

    async fn start_session(client: &Client, assignment_id: i64) -> Value {
        let response = client
            .post("/api/session/start")
            .header(ContentType::JSON)
            .body(json!({ "assignment_id": assignment_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        serde_json::from_str(&body).unwrap()
    }

    async fn submit_set(client: &Client, payload: Value) -> (Status, Option<Value>) {
        let response = client
            .post("/api/session/set")
            .header(ContentType::JSON)
            .body(payload.to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_string().await;
        (status, body.and_then(|b| serde_json::from_str(&b).ok()))
    }

    #[rocket::async_test]
    async fn test_guided_session_happy_path() {
        let test_db = create_standard_test_db().await;
        let trainee_id = test_db.user_id("alex@example.com").unwrap();
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "alex@example.com", "password123").await;

        // Push Day: Bench Press 2x (rest 30s), Incline Row 1x (rest 45s).
        let snapshot = start_session(&client, assignment_id).await;
        assert_eq!(snapshot["phase"].as_str(), Some("active"));
        assert_eq!(snapshot["exercise_index"].as_u64(), Some(0));
        assert_eq!(snapshot["set_number"].as_u64(), Some(1));
        assert_eq!(snapshot["total_exercises"].as_u64(), Some(2));
        assert_eq!(snapshot["exercise"]["name"].as_str(), Some("Bench Press"));

        let (status, snapshot) =
            submit_set(&client, json!({ "reps": 10, "load_kg": 60.0 })).await;
        assert_eq!(status, Status::Ok);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot["phase"].as_str(), Some("resting"));
        assert_eq!(snapshot["set_number"].as_u64(), Some(2));
        assert_eq!(snapshot["seconds_remaining"].as_u64(), Some(30));

        // No set submissions while resting.
        let (status, _) = submit_set(&client, json!({ "reps": 9 })).await;
        assert_eq!(status, Status::BadRequest);

        let response = client.post("/api/session/skip-rest").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        let snapshot: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(snapshot["phase"].as_str(), Some("active"));
        assert_eq!(snapshot["set_number"].as_u64(), Some(2));

        let (status, snapshot) = submit_set(&client, json!({ "reps": 8, "load_kg": 60.0 })).await;
        assert_eq!(status, Status::Ok);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot["phase"].as_str(), Some("active"));
        assert_eq!(snapshot["exercise_index"].as_u64(), Some(1));
        assert_eq!(snapshot["set_number"].as_u64(), Some(1));
        assert_eq!(snapshot["exercise"]["name"].as_str(), Some("Incline Row"));

        let (status, snapshot) =
            submit_set(&client, json!({ "reps": 12, "note": "felt easy" })).await;
        assert_eq!(status, Status::Ok);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot["phase"].as_str(), Some("completed"));

        // The persisted session is gone from the registry.
        let response = client.get("/api/session").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(format!("/api/trainees/{}/executions", trainee_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        let executions: Value = serde_json::from_str(&body).unwrap();
        let executions = executions.as_array().unwrap();
        assert_eq!(executions.len(), 1);

        let execution = &executions[0];
        assert_eq!(execution["assignment_id"].as_i64(), Some(assignment_id));
        let exercises = execution["exercises"].as_array().unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0]["sets"].as_array().unwrap().len(), 2);
        assert_eq!(exercises[1]["sets"].as_array().unwrap().len(), 1);
        assert_eq!(exercises[0]["sets"][0]["reps"].as_u64(), Some(10));
        assert_eq!(exercises[0]["sets"][1]["reps"].as_u64(), Some(8));
        assert_eq!(exercises[1]["sets"][0]["reps"].as_u64(), Some(12));
        assert_eq!(
            exercises[1]["sets"][0]["note"].as_str(),
            Some("felt easy")
        );
    }

    #[rocket::async_test]
    async fn test_missing_reps_leave_session_unchanged() {
        let test_db = create_standard_test_db().await;
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "alex@example.com", "password123").await;
        start_session(&client, assignment_id).await;

        let (status, _) = submit_set(&client, json!({})).await;
        assert_eq!(status, Status::BadRequest);

        let (status, _) = submit_set(&client, json!({ "reps": -2 })).await;
        assert_eq!(status, Status::BadRequest);

        let response = client.get("/api/session").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        let snapshot: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(snapshot["phase"].as_str(), Some("active"));
        assert_eq!(snapshot["set_number"].as_u64(), Some(1));
        assert_eq!(snapshot["recorded"].as_array().unwrap().len(), 0);
    }

    #[rocket::async_test]
    async fn test_abandon_never_persists_anything() {
        let test_db = create_standard_test_db().await;
        let trainee_id = test_db.user_id("alex@example.com").unwrap();
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "alex@example.com", "password123").await;
        start_session(&client, assignment_id).await;

        let (status, _) = submit_set(&client, json!({ "reps": 10 })).await;
        assert_eq!(status, Status::Ok);

        let response = client.post("/api/session/abandon").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/session").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(format!("/api/trainees/{}/executions", trainee_id))
            .dispatch()
            .await;
        let body = response.into_string().await.unwrap();
        let executions: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(executions.as_array().unwrap().len(), 0);
    }

    #[rocket::async_test]
    async fn test_one_session_at_a_time() {
        let test_db = create_standard_test_db().await;
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "alex@example.com", "password123").await;
        start_session(&client, assignment_id).await;

        let response = client
            .post("/api/session/start")
            .header(ContentType::JSON)
            .body(json!({ "assignment_id": assignment_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_previous_rejected_at_first_exercise() {
        let test_db = create_standard_test_db().await;
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "alex@example.com", "password123").await;
        start_session(&client, assignment_id).await;

        let response = client.post("/api/session/previous").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_coach_cannot_run_guided_sessions() {
        let test_db = create_standard_test_db().await;
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "coach@example.com", "password123").await;

        let response = client
            .post("/api/session/start")
            .header(ContentType::JSON)
            .body(json!({ "assignment_id": assignment_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_finish_requires_a_completed_session() {
        let test_db = create_standard_test_db().await;
        let assignment_id = test_db.assignment_id("Push Day").unwrap();
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "alex@example.com", "password123").await;

        // No session at all.
        let response = client.post("/api/session/finish").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        // A live but unfinished session cannot be force-finished.
        start_session(&client, assignment_id).await;
        let response = client.post("/api/session/finish").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
