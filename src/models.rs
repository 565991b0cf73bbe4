use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_rest_seconds() -> u32 {
    60
}

/// One entry in a plan's ordered exercise sequence. Exercises live inside
/// their plan (JSON column); they have no table of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub sets: u32,
    pub reps: String,
    #[serde(default)]
    pub load_kg: Option<f64>,
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub video_media: Option<String>,
}

impl Exercise {
    /// Assigns a fresh id to any exercise that arrived without one.
    pub fn ensure_ids(exercises: &mut [Exercise]) {
        for exercise in exercises {
            if exercise.id.is_empty() {
                exercise.id = Uuid::new_v4().to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: i64,
    pub coach_id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub duration_minutes: i64,
    pub level: String,
    pub notes: String,
    pub exercises: Vec<Exercise>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPlan {
    pub id: Option<i64>,
    pub coach_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub duration_minutes: Option<i64>,
    pub level: Option<String>,
    pub notes: Option<String>,
    pub exercises: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbPlan> for Plan {
    fn from(db: DbPlan) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            coach_id: db.coach_id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            category: db.category.unwrap_or_default(),
            duration_minutes: db.duration_minutes.unwrap_or_default(),
            level: db.level.unwrap_or_default(),
            notes: db.notes.unwrap_or_default(),
            exercises: from_json_column(db.exercises),
            created_at: utc_from_naive(db.created_at),
            updated_at: utc_from_naive(db.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Inactive,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, anyhow::Error> {
        match s {
            "active" => Ok(AssignmentStatus::Active),
            "inactive" => Ok(AssignmentStatus::Inactive),
            _ => Err(anyhow::Error::msg(format!(
                "Unknown assignment status: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub trainee_id: i64,
    pub plan_id: i64,
    pub coach_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub weekdays: Vec<Weekday>,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAssignment {
    pub id: Option<i64>,
    pub trainee_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub coach_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub weekdays: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbAssignment> for Assignment {
    fn from(db: DbAssignment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            trainee_id: db.trainee_id.unwrap_or_default(),
            plan_id: db.plan_id.unwrap_or_default(),
            coach_id: db.coach_id.unwrap_or_default(),
            start_date: db.start_date.unwrap_or_else(|| Utc::now().date_naive()),
            end_date: db.end_date,
            weekdays: from_json_column(db.weekdays),
            status: db
                .status
                .as_deref()
                .and_then(|s| AssignmentStatus::from_str(s).ok())
                .unwrap_or(AssignmentStatus::Inactive),
            created_at: utc_from_naive(db.created_at),
        }
    }
}

/// One performed set within an exercise result. `set_number` runs 1..N over
/// the plan's configured set count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetResult {
    pub set_number: u32,
    pub reps: u32,
    #[serde(default)]
    pub load_kg: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub exercise_id: String,
    pub sets: Vec<SetResult>,
}

/// A completed guided session as persisted. Executions are created once and
/// never updated.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub id: i64,
    pub trainee_id: i64,
    pub assignment_id: i64,
    pub performed_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub exercises: Vec<ExerciseResult>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbExecution {
    pub id: Option<i64>,
    pub trainee_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub performed_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub exercises: Option<String>,
}

impl From<DbExecution> for Execution {
    fn from(db: DbExecution) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            trainee_id: db.trainee_id.unwrap_or_default(),
            assignment_id: db.assignment_id.unwrap_or_default(),
            performed_at: utc_from_naive(db.performed_at),
            duration_minutes: db.duration_minutes.unwrap_or_default(),
            exercises: from_json_column(db.exercises),
        }
    }
}

/// The aggregated payload a completed session submits for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExecution {
    pub assignment_id: i64,
    pub duration_minutes: i64,
    pub performed_at: DateTime<Utc>,
    pub exercises: Vec<ExerciseResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub recorded_at: DateTime<Utc>,
    pub weight_kg: f64,
    pub height_cm: f64,
}

/// Input for creating or replacing a plan's content.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub notes: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub duration_minutes: Option<i64>,
    pub level: Option<String>,
    pub notes: Option<String>,
    pub exercises: Option<Vec<Exercise>>,
}

#[derive(Debug, Clone)]
pub struct TraineeDraft {
    pub name: String,
    pub email: String,
    pub password: String,
    pub coach_id: i64,
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<String>,
    pub goal: Option<String>,
    pub restrictions: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraineeUpdate {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<String>,
    pub goal: Option<String>,
    pub restrictions: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentDraft {
    pub trainee_id: i64,
    pub plan_id: i64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub weekdays: Vec<Weekday>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentUpdate {
    pub status: Option<AssignmentStatus>,
    pub weekdays: Option<Vec<Weekday>>,
    pub end_date: Option<NaiveDate>,
}

pub(crate) fn from_json_column<T: DeserializeOwned + Default>(raw: Option<String>) -> T {
    raw.as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

pub(crate) fn utc_from_naive(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}
