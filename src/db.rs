use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, DbUserSession, Role, User, UserSession};
use crate::error::AppError;
use crate::models::{
    Assignment, AssignmentDraft, AssignmentUpdate, DbAssignment, DbExecution, DbPlan, Execution,
    Exercise, Measurement, NewExecution, Plan, PlanDraft, PlanUpdate, TraineeDraft, TraineeUpdate,
};

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, role, avatar, specialization, coach_id, age, weight_kg,
                height_cm, sex, goal, restrictions, measurements, created_at
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<User>, AppError> {
    info!("Fetching user by email");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, role, avatar, specialization, coach_id, age, weight_kg,
                height_cm, sex, goal, restrictions, measurements, created_at
         FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(email))]
pub async fn create_coach(
    pool: &Pool<Sqlite>,
    name: &str,
    email: &str,
    password: &str,
    specialization: Option<&str>,
    avatar: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating new coach");

    if find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::Validation(format!(
            "Email '{}' is already registered",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (name, email, password, role, specialization, avatar)
         VALUES (?, ?, ?, 'coach', ?, ?)",
    )
    .bind(name)
    .bind(email)
    .bind(hashed_password)
    .bind(specialization)
    .bind(avatar)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all, fields(email = %draft.email, coach_id = %draft.coach_id))]
pub async fn create_trainee(pool: &Pool<Sqlite>, draft: &TraineeDraft) -> Result<i64, AppError> {
    info!("Creating new trainee");

    if find_user_by_email(pool, &draft.email).await?.is_some() {
        return Err(AppError::Validation(format!(
            "Email '{}' is already registered",
            draft.email
        )));
    }

    let coach = get_user(pool, draft.coach_id)
        .await
        .map_err(|_| AppError::Validation("Unknown coach code".to_string()))?;
    if coach.role != Role::Coach {
        return Err(AppError::Validation("Unknown coach code".to_string()));
    }

    let hashed_password = bcrypt::hash(&draft.password, bcrypt::DEFAULT_COST)?;

    // A trainee registered with body stats starts their measurement history
    // at those values.
    let measurements = match (draft.weight_kg, draft.height_cm) {
        (Some(weight_kg), Some(height_cm)) => serde_json::to_string(&vec![Measurement {
            recorded_at: Utc::now(),
            weight_kg,
            height_cm,
        }])?,
        _ => "[]".to_string(),
    };

    let res = sqlx::query(
        "INSERT INTO users
         (name, email, password, role, coach_id, age, weight_kg, height_cm, sex, goal,
          restrictions, avatar, measurements)
         VALUES (?, ?, ?, 'trainee', ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&draft.name)
    .bind(&draft.email)
    .bind(hashed_password)
    .bind(draft.coach_id)
    .bind(draft.age)
    .bind(draft.weight_kg)
    .bind(draft.height_cm)
    .bind(&draft.sex)
    .bind(&draft.goal)
    .bind(&draft.restrictions)
    .bind(&draft.avatar)
    .bind(measurements)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct CredentialRow {
        id: i64,
        password: String,
    }

    let row = sqlx::query_as::<_, CredentialRow>("SELECT id, password FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(cred) => {
            let valid = bcrypt::verify(password, &cred.password).unwrap_or(false);
            if valid {
                Ok(Some(get_user(pool, cred.id).await?))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}

#[instrument]
pub async fn get_trainees_for_coach(
    pool: &Pool<Sqlite>,
    coach_id: i64,
) -> Result<Vec<User>, AppError> {
    info!("Getting trainees for coach");
    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, role, avatar, specialization, coach_id, age, weight_kg,
                height_cm, sex, goal, restrictions, measurements, created_at
         FROM users WHERE role = 'trainee' AND coach_id = ?
         ORDER BY name",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument]
pub async fn update_trainee_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    update: &TraineeUpdate,
) -> Result<(), AppError> {
    info!("Updating trainee profile");
    let res = sqlx::query(
        "UPDATE users SET
             name = COALESCE(?, name),
             age = COALESCE(?, age),
             weight_kg = COALESCE(?, weight_kg),
             height_cm = COALESCE(?, height_cm),
             sex = COALESCE(?, sex),
             goal = COALESCE(?, goal),
             restrictions = COALESCE(?, restrictions),
             avatar = COALESCE(?, avatar)
         WHERE id = ?",
    )
    .bind(&update.name)
    .bind(update.age)
    .bind(update.weight_kg)
    .bind(update.height_cm)
    .bind(&update.sex)
    .bind(&update.goal)
    .bind(&update.restrictions)
    .bind(&update.avatar)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            user_id
        )));
    }

    Ok(())
}

/// Appends to the measurement history and rolls the current weight/height
/// forward, the same way the trainee's profile tracks them.
#[instrument]
pub async fn add_measurement(
    pool: &Pool<Sqlite>,
    user_id: i64,
    weight_kg: f64,
    height_cm: f64,
) -> Result<(), AppError> {
    info!("Adding measurement");
    let user = get_user(pool, user_id).await?;

    let mut measurements = user.measurements;
    measurements.push(Measurement {
        recorded_at: Utc::now(),
        weight_kg,
        height_cm,
    });
    let measurements_json = serde_json::to_string(&measurements)?;

    sqlx::query("UPDATE users SET measurements = ?, weight_kg = ?, height_cm = ? WHERE id = ?")
        .bind(measurements_json)
        .bind(weight_kg)
        .bind(height_cm)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Removes a trainee account. The trainee's assignments and recorded
/// executions go with it; login sessions cascade through the schema.
#[instrument]
pub async fn delete_trainee(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    coach_id: i64,
) -> Result<(), AppError> {
    info!("Deleting trainee");

    let trainee = get_user(pool, trainee_id).await?;
    if trainee.role != Role::Trainee || trainee.coach_id != Some(coach_id) {
        return Err(AppError::NotFound(format!(
            "Trainee with id {} not found for this coach",
            trainee_id
        )));
    }

    sqlx::query("DELETE FROM executions WHERE trainee_id = ?")
        .bind(trainee_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM assignments WHERE trainee_id = ?")
        .bind(trainee_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(trainee_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip_all, fields(coach_id, name = %draft.name))]
pub async fn create_plan(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    draft: &PlanDraft,
) -> Result<Plan, AppError> {
    info!("Creating plan");

    let mut exercises = draft.exercises.clone();
    Exercise::ensure_ids(&mut exercises);
    let exercises_json = serde_json::to_string(&exercises)?;

    let res = sqlx::query(
        "INSERT INTO plans
         (coach_id, name, description, category, duration_minutes, level, notes, exercises)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(coach_id)
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(&draft.category)
    .bind(draft.duration_minutes)
    .bind(&draft.level)
    .bind(&draft.notes)
    .bind(exercises_json)
    .execute(pool)
    .await?;

    get_plan(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_plan(pool: &Pool<Sqlite>, id: i64) -> Result<Plan, AppError> {
    info!("Getting plan");
    let row = sqlx::query_as::<_, DbPlan>("SELECT * FROM plans WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(plan) => Ok(Plan::from(plan)),
        _ => Err(AppError::NotFound(format!(
            "Plan with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn get_plans_for_coach(
    pool: &Pool<Sqlite>,
    coach_id: i64,
) -> Result<Vec<Plan>, AppError> {
    info!("Getting plans for coach");
    let rows = sqlx::query_as::<_, DbPlan>(
        "SELECT * FROM plans WHERE coach_id = ? ORDER BY updated_at DESC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Plan::from).collect())
}

#[instrument(skip(pool, update))]
pub async fn update_plan(
    pool: &Pool<Sqlite>,
    plan_id: i64,
    coach_id: i64,
    update: &PlanUpdate,
) -> Result<Plan, AppError> {
    info!("Updating plan");

    let existing = sqlx::query_as::<_, DbPlan>("SELECT * FROM plans WHERE id = ? AND coach_id = ?")
        .bind(plan_id)
        .bind(coach_id)
        .fetch_optional(pool)
        .await?;
    if existing.is_none() {
        return Err(AppError::NotFound(format!(
            "Plan with id {} not found in database",
            plan_id
        )));
    }

    let exercises_json = match &update.exercises {
        Some(exercises) => {
            let mut exercises = exercises.clone();
            Exercise::ensure_ids(&mut exercises);
            Some(serde_json::to_string(&exercises)?)
        }
        None => None,
    };

    let now = Utc::now().naive_utc();
    sqlx::query(
        "UPDATE plans SET
             name = COALESCE(?, name),
             description = COALESCE(?, description),
             category = COALESCE(?, category),
             duration_minutes = COALESCE(?, duration_minutes),
             level = COALESCE(?, level),
             notes = COALESCE(?, notes),
             exercises = COALESCE(?, exercises),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(&update.name)
    .bind(&update.description)
    .bind(&update.category)
    .bind(update.duration_minutes)
    .bind(&update.level)
    .bind(&update.notes)
    .bind(exercises_json)
    .bind(now)
    .bind(plan_id)
    .execute(pool)
    .await?;

    get_plan(pool, plan_id).await
}

#[instrument]
pub async fn delete_plan(pool: &Pool<Sqlite>, plan_id: i64, coach_id: i64) -> Result<(), AppError> {
    info!("Deleting plan");

    let res = sqlx::query("DELETE FROM plans WHERE id = ? AND coach_id = ?")
        .bind(plan_id)
        .bind(coach_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Plan with id {} not found in database",
            plan_id
        )));
    }

    Ok(())
}

#[instrument(skip_all, fields(coach_id, trainee_id = %draft.trainee_id, plan_id = %draft.plan_id))]
pub async fn create_assignment(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    draft: &AssignmentDraft,
) -> Result<Assignment, AppError> {
    info!("Creating assignment");

    let weekdays_json = serde_json::to_string(&draft.weekdays)?;

    let res = sqlx::query(
        "INSERT INTO assignments
         (trainee_id, plan_id, coach_id, start_date, end_date, weekdays, status)
         VALUES (?, ?, ?, ?, ?, ?, 'active')",
    )
    .bind(draft.trainee_id)
    .bind(draft.plan_id)
    .bind(coach_id)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(weekdays_json)
    .execute(pool)
    .await?;

    get_assignment(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_assignment(pool: &Pool<Sqlite>, id: i64) -> Result<Assignment, AppError> {
    info!("Getting assignment");
    let row = sqlx::query_as::<_, DbAssignment>("SELECT * FROM assignments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(assignment) => Ok(Assignment::from(assignment)),
        _ => Err(AppError::NotFound(format!(
            "Assignment with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn get_assignments_for_trainee(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
) -> Result<Vec<Assignment>, AppError> {
    info!("Getting assignments for trainee");
    let rows = sqlx::query_as::<_, DbAssignment>(
        "SELECT * FROM assignments WHERE trainee_id = ? ORDER BY created_at DESC",
    )
    .bind(trainee_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Assignment::from).collect())
}

#[instrument]
pub async fn get_assignments_for_coach(
    pool: &Pool<Sqlite>,
    coach_id: i64,
) -> Result<Vec<Assignment>, AppError> {
    info!("Getting assignments for coach");
    let rows = sqlx::query_as::<_, DbAssignment>(
        "SELECT * FROM assignments WHERE coach_id = ? ORDER BY created_at DESC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Assignment::from).collect())
}

#[instrument(skip(pool, update))]
pub async fn update_assignment(
    pool: &Pool<Sqlite>,
    assignment_id: i64,
    coach_id: i64,
    update: &AssignmentUpdate,
) -> Result<Assignment, AppError> {
    info!("Updating assignment");

    let weekdays_json = match &update.weekdays {
        Some(weekdays) => Some(serde_json::to_string(weekdays)?),
        None => None,
    };

    let res = sqlx::query(
        "UPDATE assignments SET
             status = COALESCE(?, status),
             weekdays = COALESCE(?, weekdays),
             end_date = COALESCE(?, end_date)
         WHERE id = ? AND coach_id = ?",
    )
    .bind(update.status.map(|s| s.as_str()))
    .bind(weekdays_json)
    .bind(update.end_date)
    .bind(assignment_id)
    .bind(coach_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Assignment with id {} not found in database",
            assignment_id
        )));
    }

    get_assignment(pool, assignment_id).await
}

#[instrument(skip_all, fields(trainee_id, assignment_id = %draft.assignment_id))]
pub async fn create_execution(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    draft: &NewExecution,
) -> Result<Execution, AppError> {
    info!("Recording execution");

    let exercises_json = serde_json::to_string(&draft.exercises)?;

    let res = sqlx::query(
        "INSERT INTO executions
         (trainee_id, assignment_id, performed_at, duration_minutes, exercises)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(trainee_id)
    .bind(draft.assignment_id)
    .bind(draft.performed_at.naive_utc())
    .bind(draft.duration_minutes)
    .bind(exercises_json)
    .execute(pool)
    .await?;

    Ok(Execution {
        id: res.last_insert_rowid(),
        trainee_id,
        assignment_id: draft.assignment_id,
        performed_at: draft.performed_at,
        duration_minutes: draft.duration_minutes,
        exercises: draft.exercises.clone(),
    })
}

#[instrument]
pub async fn get_executions_for_trainee(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
) -> Result<Vec<Execution>, AppError> {
    info!("Getting executions for trainee");
    let rows = sqlx::query_as::<_, DbExecution>(
        "SELECT id, trainee_id, assignment_id, performed_at, duration_minutes, exercises
         FROM executions WHERE trainee_id = ? ORDER BY performed_at DESC",
    )
    .bind(trainee_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Execution::from).collect())
}

#[instrument]
pub async fn get_executions_for_assignment(
    pool: &Pool<Sqlite>,
    assignment_id: i64,
) -> Result<Vec<Execution>, AppError> {
    info!("Getting executions for assignment");
    let rows = sqlx::query_as::<_, DbExecution>(
        "SELECT id, trainee_id, assignment_id, performed_at, duration_minutes, exercises
         FROM executions WHERE assignment_id = ? ORDER BY performed_at DESC",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Execution::from).collect())
}
