use std::collections::HashMap;
use std::sync::Once;

use chrono::Utc;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::api::LoginResponse;
use crate::db::{create_assignment, create_coach, create_plan, create_trainee};
use crate::error::AppError;
use crate::init_rocket;
use crate::models::{AssignmentDraft, Exercise, Plan, PlanDraft, TraineeDraft, Weekday};

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";

pub fn exercise(
    name: &str,
    sets: u32,
    reps: &str,
    load_kg: Option<f64>,
    rest_seconds: u32,
) -> Exercise {
    Exercise {
        id: String::new(),
        name: name.to_string(),
        sets,
        reps: reps.to_string(),
        load_kg,
        rest_seconds,
        notes: None,
        video_url: None,
        video_media: None,
    }
}

pub fn sample_exercises() -> Vec<Exercise> {
    vec![
        exercise("Bench Press", 2, "8-12", Some(60.0), 30),
        exercise("Incline Row", 1, "10", None, 45),
    ]
}

/// An in-memory plan with assigned exercise ids, for driving the engine
/// without a database.
pub fn test_plan(exercises: Vec<Exercise>) -> Plan {
    let mut exercises = exercises;
    Exercise::ensure_ids(&mut exercises);
    Plan {
        id: 1,
        coach_id: 1,
        name: "Push Day".to_string(),
        description: String::new(),
        category: "strength".to_string(),
        duration_minutes: 45,
        level: "intermediate".to_string(),
        notes: String::new(),
        exercises,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

struct TestCoach {
    name: String,
    email: String,
}

struct TestTrainee {
    name: String,
    email: String,
    coach_email: Option<String>,
}

struct TestPlan {
    name: String,
    coach_email: Option<String>,
    exercises: Vec<Exercise>,
}

struct TestAssignment {
    plan_name: String,
    trainee_email: String,
    weekdays: Vec<Weekday>,
}

#[derive(Default)]
pub struct TestDbBuilder {
    coaches: Vec<TestCoach>,
    trainees: Vec<TestTrainee>,
    plans: Vec<TestPlan>,
    assignments: Vec<TestAssignment>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coach(mut self, name: &str, email: &str) -> Self {
        self.coaches.push(TestCoach {
            name: name.to_string(),
            email: email.to_string(),
        });
        self
    }

    pub fn trainee(mut self, name: &str, email: &str, coach_email: Option<&str>) -> Self {
        self.trainees.push(TestTrainee {
            name: name.to_string(),
            email: email.to_string(),
            coach_email: coach_email.map(String::from),
        });
        self
    }

    pub fn plan(mut self, name: &str, coach_email: Option<&str>, exercises: Vec<Exercise>) -> Self {
        self.plans.push(TestPlan {
            name: name.to_string(),
            coach_email: coach_email.map(String::from),
            exercises,
        });
        self
    }

    pub fn assignment(
        mut self,
        plan_name: &str,
        trainee_email: &str,
        weekdays: Vec<Weekday>,
    ) -> Self {
        self.assignments.push(TestAssignment {
            plan_name: plan_name.to_string(),
            trainee_email: trainee_email.to_string(),
            weekdays,
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });

        // One connection only: every pooled connection to `sqlite::memory:`
        // would otherwise get its own private database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut user_id_map: HashMap<String, i64> = HashMap::new();
        let mut plan_id_map: HashMap<String, i64> = HashMap::new();
        let mut plan_coach_map: HashMap<String, i64> = HashMap::new();
        let mut assignment_id_map: HashMap<String, i64> = HashMap::new();

        for coach in &self.coaches {
            let coach_id = create_coach(
                &pool,
                &coach.name,
                &coach.email,
                STANDARD_PASSWORD,
                None,
                None,
            )
            .await?;
            user_id_map.insert(coach.email.clone(), coach_id);
        }

        for trainee in &self.trainees {
            let coach_id = match &trainee.coach_email {
                Some(email) => user_id_map.get(email).copied(),
                None => self
                    .coaches
                    .first()
                    .and_then(|c| user_id_map.get(&c.email).copied()),
            }
            .expect("trainee needs a coach in the builder");

            let trainee_id = create_trainee(
                &pool,
                &TraineeDraft {
                    name: trainee.name.clone(),
                    email: trainee.email.clone(),
                    password: STANDARD_PASSWORD.to_string(),
                    coach_id,
                    age: Some(30),
                    weight_kg: Some(80.0),
                    height_cm: Some(180.0),
                    sex: None,
                    goal: None,
                    restrictions: None,
                    avatar: None,
                },
            )
            .await?;
            user_id_map.insert(trainee.email.clone(), trainee_id);
        }

        for plan in &self.plans {
            let coach_id = match &plan.coach_email {
                Some(email) => user_id_map.get(email).copied(),
                None => self
                    .coaches
                    .first()
                    .and_then(|c| user_id_map.get(&c.email).copied()),
            }
            .expect("plan needs a coach in the builder");

            let created = create_plan(
                &pool,
                coach_id,
                &PlanDraft {
                    name: plan.name.clone(),
                    description: String::new(),
                    category: "strength".to_string(),
                    duration_minutes: 45,
                    level: "intermediate".to_string(),
                    notes: String::new(),
                    exercises: plan.exercises.clone(),
                },
            )
            .await?;
            plan_id_map.insert(plan.name.clone(), created.id);
            plan_coach_map.insert(plan.name.clone(), coach_id);
        }

        for assignment in &self.assignments {
            let plan_id = plan_id_map
                .get(&assignment.plan_name)
                .copied()
                .expect("assignment references an unknown plan");
            let coach_id = plan_coach_map
                .get(&assignment.plan_name)
                .copied()
                .expect("assignment references an unknown plan");
            let trainee_id = user_id_map
                .get(&assignment.trainee_email)
                .copied()
                .expect("assignment references an unknown trainee");

            let created = create_assignment(
                &pool,
                coach_id,
                &AssignmentDraft {
                    trainee_id,
                    plan_id,
                    start_date: Utc::now().date_naive(),
                    end_date: None,
                    weekdays: assignment.weekdays.clone(),
                },
            )
            .await?;
            assignment_id_map.insert(assignment.plan_name.clone(), created.id);
        }

        Ok(TestDb {
            pool,
            user_id_map,
            plan_id_map,
            assignment_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub user_id_map: HashMap<String, i64>,
    pub plan_id_map: HashMap<String, i64>,
    pub assignment_id_map: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, email: &str) -> Option<i64> {
        self.user_id_map.get(email).copied()
    }

    pub fn plan_id(&self, name: &str) -> Option<i64> {
        self.plan_id_map.get(name).copied()
    }

    pub fn assignment_id(&self, plan_name: &str) -> Option<i64> {
        self.assignment_id_map.get(plan_name).copied()
    }
}

pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .coach("Coach Carter", "coach@example.com")
        .trainee("Alex Lifts", "alex@example.com", None)
        .plan("Push Day", None, sample_exercises())
        .assignment("Push Day", "alex@example.com", vec![Weekday::Mon, Weekday::Wed])
        .build()
        .await
        .expect("Failed to build test database")
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let rocket = init_rocket(test_db.pool.clone()).await;
    let client = Client::tracked(rocket)
        .await
        .expect("valid rocket instance");
    (client, test_db)
}

/// Logs in through the API; the tracked client keeps the session cookies
/// for every request that follows.
pub async fn login_test_user(client: &Client, email: &str, password: &str) {
    let response = client
        .post("/api/login")
        .header(ContentType::JSON)
        .body(json!({ "email": email, "password": password }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);

    let body = response.into_string().await.unwrap();
    let login_response: LoginResponse = serde_json::from_str(&body).unwrap();
    assert!(login_response.success, "login failed for {}", email);
}
