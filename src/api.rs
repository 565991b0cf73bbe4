use chrono::Utc;
use rocket::State;
use rocket::http::{Cookie, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, Role, User, UserSession};
use crate::db::{
    add_measurement, authenticate_user, create_assignment, create_coach, create_execution,
    create_plan, create_trainee, create_user_session, delete_plan, delete_trainee,
    get_assignment, get_assignments_for_coach, get_assignments_for_trainee,
    get_executions_for_assignment,
    get_executions_for_trainee, get_plan, get_plans_for_coach, get_trainees_for_coach, get_user,
    invalidate_session, update_assignment, update_plan, update_trainee_profile,
};
use crate::engine::{SessionRegistry, SessionSnapshot, SetEntry};
use crate::error::AppError;
use crate::models::{
    Assignment, AssignmentDraft, AssignmentUpdate, Execution, ExerciseResult, Measurement,
    NewExecution, Plan, PlanDraft, PlanUpdate, TraineeDraft, TraineeUpdate,
};
use crate::validation::{AppErrorExt, JsonValidateExt, PermissionCheckExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub avatar: Option<String>,
    pub specialization: Option<String>,
    pub coach_id: Option<i64>,
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub sex: Option<String>,
    pub goal: Option<String>,
    pub restrictions: Option<String>,
    pub measurements: Vec<Measurement>,
    pub created_at: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.to_string(),
            avatar: user.avatar,
            specialization: user.specialization,
            coach_id: user.coach_id,
            age: user.age,
            weight_kg: user.weight_kg,
            height_cm: user.height_cm,
            sex: user.sex,
            goal: user.goal,
            restrictions: user.restrictions,
            measurements: user.measurements,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

const SESSION_HOURS: i64 = 12;

async fn open_login_session(
    db: &Pool<Sqlite>,
    cookies: &rocket::http::CookieJar<'_>,
    user: &User,
) -> Result<(), AppError> {
    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(SESSION_HOURS);

    create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build(("session_token", token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
    );

    cookies.add_private(
        Cookie::build(("user_role", user.role.as_str().to_string()))
            .same_site(SameSite::Lax)
            .max_age(rocket::time::Duration::hours(SESSION_HOURS)),
    );

    Ok(())
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            open_login_session(db, cookies, &user)
                .await
                .validate_custom()?;

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid email or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Status {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(Cookie::build("session_token"));
    cookies.remove_private(Cookie::build("user_role"));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[derive(Deserialize, Validate, Clone)]
pub struct RegisterCoachRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    specialization: Option<String>,
    avatar: Option<String>,
}

#[post("/register/coach", data = "<registration>")]
pub async fn api_register_coach(
    registration: Json<RegisterCoachRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    let coach_id = create_coach(
        db,
        &validated.name,
        &validated.email,
        &validated.password,
        validated.specialization.as_deref(),
        validated.avatar.as_deref(),
    )
    .await
    .validate_custom()?;

    let user = get_user(db, coach_id).await.validate_custom()?;
    open_login_session(db, cookies, &user)
        .await
        .validate_custom()?;

    Ok(Json(LoginResponse {
        success: true,
        user: Some(UserData::from(user)),
        error: None,
    }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct RegisterTraineeRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    #[validate(range(min = 1, message = "A coach code is required"))]
    coach_id: i64,
    age: Option<i64>,
    weight_kg: Option<f64>,
    height_cm: Option<f64>,
    sex: Option<String>,
    goal: Option<String>,
    restrictions: Option<String>,
    avatar: Option<String>,
}

#[post("/register/trainee", data = "<registration>")]
pub async fn api_register_trainee(
    registration: Json<RegisterTraineeRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    let draft = TraineeDraft {
        name: validated.name,
        email: validated.email,
        password: validated.password,
        coach_id: validated.coach_id,
        age: validated.age,
        weight_kg: validated.weight_kg,
        height_cm: validated.height_cm,
        sex: validated.sex,
        goal: validated.goal,
        restrictions: validated.restrictions,
        avatar: validated.avatar,
    };

    let trainee_id = create_trainee(db, &draft).await.validate_custom()?;

    let user = get_user(db, trainee_id).await.validate_custom()?;
    open_login_session(db, cookies, &user)
        .await
        .validate_custom()?;

    Ok(Json(LoginResponse {
        success: true,
        user: Some(UserData::from(user)),
        error: None,
    }))
}

#[get("/trainees")]
pub async fn api_get_trainees(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, Status> {
    user.require_permission(Permission::ViewAllTrainees)?;

    let trainees = get_trainees_for_coach(db, user.id).await?;

    Ok(Json(trainees.into_iter().map(UserData::from).collect()))
}

#[derive(Deserialize, Validate, Clone)]
pub struct CreateTraineeRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    password: Option<String>,
    age: Option<i64>,
    weight_kg: Option<f64>,
    height_cm: Option<f64>,
    sex: Option<String>,
    goal: Option<String>,
    restrictions: Option<String>,
    avatar: Option<String>,
}

#[post("/trainees", data = "<request>")]
pub async fn api_create_trainee(
    request: Json<CreateTraineeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Custom<Json<ValidationResponse>>> {
    user.require_all_permissions(&[Permission::ManageTrainees, Permission::ViewAllTrainees])
        .validate_custom()?;

    let validated = request.validate_custom()?;

    // Coach-created accounts get a starter password the trainee is expected
    // to change on first login.
    let draft = TraineeDraft {
        name: validated.name,
        email: validated.email,
        password: validated.password.unwrap_or_else(|| "changeme123".to_string()),
        coach_id: user.id,
        age: validated.age,
        weight_kg: validated.weight_kg,
        height_cm: validated.height_cm,
        sex: validated.sex,
        goal: validated.goal,
        restrictions: validated.restrictions,
        avatar: validated.avatar,
    };

    let trainee_id = create_trainee(db, &draft).await.validate_custom()?;
    let trainee = get_user(db, trainee_id).await.validate_custom()?;

    Ok(Json(UserData::from(trainee)))
}

#[get("/trainees/<id>")]
pub async fn api_get_trainee(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Status> {
    if user.id != id && !user.has_permission(Permission::ViewAllTrainees) {
        return Err(Status::Forbidden);
    }

    let trainee = get_user(db, id).await?;

    Ok(Json(UserData::from(trainee)))
}

#[put("/trainees/<id>", data = "<update>")]
pub async fn api_update_trainee(
    id: i64,
    update: Json<TraineeUpdate>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Status> {
    let editing_own_profile = user.id == id && user.has_permission(Permission::EditOwnProfile);
    if !editing_own_profile && !user.has_permission(Permission::ManageTrainees) {
        return Err(Status::Forbidden);
    }

    update_trainee_profile(db, id, &update).await?;
    let trainee = get_user(db, id).await?;

    Ok(Json(UserData::from(trainee)))
}

#[delete("/trainees/<id>")]
pub async fn api_delete_trainee(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageTrainees)?;

    delete_trainee(db, id, user.id).await?;

    Ok(Status::Ok)
}

#[derive(Deserialize)]
pub struct AddMeasurementRequest {
    weight_kg: f64,
    height_cm: f64,
}

#[post("/trainees/<id>/measurements", data = "<request>")]
pub async fn api_add_measurement(
    id: i64,
    request: Json<AddMeasurementRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    if user.id != id && !user.has_permission(Permission::ManageTrainees) {
        return Err(Status::Forbidden);
    }

    add_measurement(db, id, request.weight_kg, request.height_cm).await?;

    Ok(Status::Ok)
}

fn validate_plan_content(draft: &PlanDraft) -> Result<(), AppError> {
    if draft.name.trim().is_empty() {
        return Err(AppError::Validation("Plan name is required".to_string()));
    }
    validate_exercises(&draft.exercises)
}

fn validate_exercises(exercises: &[crate::models::Exercise]) -> Result<(), AppError> {
    if exercises.is_empty() {
        return Err(AppError::Validation(
            "A plan needs at least one exercise".to_string(),
        ));
    }
    for exercise in exercises {
        if exercise.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Every exercise needs a name".to_string(),
            ));
        }
        if exercise.sets == 0 {
            return Err(AppError::Validation(format!(
                "Exercise '{}' must have at least one set",
                exercise.name
            )));
        }
        if exercise.video_url.is_some() && exercise.video_media.is_some() {
            return Err(AppError::Validation(format!(
                "Exercise '{}' cannot have both a video link and embedded media",
                exercise.name
            )));
        }
    }
    Ok(())
}

#[post("/plans", data = "<draft>")]
pub async fn api_create_plan(
    draft: Json<PlanDraft>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Plan>, AppError> {
    if !user.has_permission(Permission::CreatePlans) {
        return Err(AppError::Authorization(
            "Only coaches can create plans".to_string(),
        ));
    }

    validate_plan_content(&draft)?;

    let plan = create_plan(db, user.id, &draft).await?;

    Ok(Json(plan))
}

#[get("/plans")]
pub async fn api_get_plans(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Plan>>, Status> {
    user.require_permission(Permission::CreatePlans)?;

    let plans = get_plans_for_coach(db, user.id).await?;

    Ok(Json(plans))
}

#[get("/plans/<id>")]
pub async fn api_get_plan(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Plan>, Status> {
    let plan = get_plan(db, id).await?;
    Ok(Json(plan))
}

#[put("/plans/<id>", data = "<update>")]
pub async fn api_update_plan(
    id: i64,
    update: Json<PlanUpdate>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Plan>, AppError> {
    if !user.has_permission(Permission::CreatePlans) {
        return Err(AppError::Authorization(
            "Only coaches can edit plans".to_string(),
        ));
    }

    if let Some(exercises) = &update.exercises {
        validate_exercises(exercises)?;
    }

    let plan = update_plan(db, id, user.id, &update).await?;

    Ok(Json(plan))
}

#[delete("/plans/<id>")]
pub async fn api_delete_plan(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::CreatePlans)?;

    delete_plan(db, id, user.id).await?;

    Ok(Status::Ok)
}

#[post("/assignments", data = "<draft>")]
pub async fn api_create_assignment(
    draft: Json<AssignmentDraft>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Assignment>, AppError> {
    if !user.has_permission(Permission::AssignPlans) {
        return Err(AppError::Authorization(
            "Only coaches can assign plans".to_string(),
        ));
    }

    if draft.weekdays.is_empty() {
        return Err(AppError::Validation(
            "An assignment needs at least one weekday".to_string(),
        ));
    }

    // Both ends of the link must exist before the binding is created.
    get_plan(db, draft.plan_id).await?;
    let trainee = get_user(db, draft.trainee_id).await?;
    if trainee.role != Role::Trainee {
        return Err(AppError::Validation(
            "Plans can only be assigned to trainees".to_string(),
        ));
    }

    let assignment = create_assignment(db, user.id, &draft).await?;

    Ok(Json(assignment))
}

#[get("/assignments")]
pub async fn api_get_coach_assignments(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Assignment>>, Status> {
    user.require_permission(Permission::AssignPlans)?;

    let assignments = get_assignments_for_coach(db, user.id).await?;

    Ok(Json(assignments))
}

#[get("/trainees/<id>/assignments")]
pub async fn api_get_trainee_assignments(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Assignment>>, Status> {
    if user.id != id && !user.has_permission(Permission::ViewTraineeProgress) {
        return Err(Status::Forbidden);
    }

    let assignments = get_assignments_for_trainee(db, id).await?;

    Ok(Json(assignments))
}

#[put("/assignments/<id>", data = "<update>")]
pub async fn api_update_assignment(
    id: i64,
    update: Json<AssignmentUpdate>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Assignment>, AppError> {
    if !user.has_permission(Permission::AssignPlans) {
        return Err(AppError::Authorization(
            "Only coaches can edit assignments".to_string(),
        ));
    }

    if let Some(weekdays) = &update.weekdays {
        if weekdays.is_empty() {
            return Err(AppError::Validation(
                "An assignment needs at least one weekday".to_string(),
            ));
        }
    }

    let assignment = update_assignment(db, id, user.id, &update).await?;

    Ok(Json(assignment))
}

#[derive(Deserialize)]
pub struct CreateExecutionRequest {
    assignment_id: i64,
    duration_minutes: i64,
    exercises: Vec<ExerciseResult>,
}

/// Records a client-aggregated execution directly, the non-guided path for
/// clients that ran the session flow on their own side.
#[post("/executions", data = "<request>")]
pub async fn api_create_execution(
    request: Json<CreateExecutionRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Execution>, AppError> {
    if !user.has_permission(Permission::RecordExecutions) {
        return Err(AppError::Authorization(
            "Only trainees can record executions".to_string(),
        ));
    }

    let assignment = get_assignment(db, request.assignment_id).await?;
    if assignment.trainee_id != user.id {
        return Err(AppError::Authorization(
            "Assignment belongs to another trainee".to_string(),
        ));
    }

    let draft = NewExecution {
        assignment_id: request.assignment_id,
        duration_minutes: request.duration_minutes,
        performed_at: Utc::now(),
        exercises: request.exercises.clone(),
    };

    let execution = create_execution(db, user.id, &draft).await?;

    Ok(Json(execution))
}

#[get("/trainees/<id>/executions")]
pub async fn api_get_trainee_executions(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Execution>>, Status> {
    if user.id != id && !user.has_permission(Permission::ViewTraineeProgress) {
        return Err(Status::Forbidden);
    }

    let executions = get_executions_for_trainee(db, id).await?;

    Ok(Json(executions))
}

#[get("/assignments/<id>/executions")]
pub async fn api_get_assignment_executions(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Execution>>, Status> {
    let assignment = get_assignment(db, id).await?;
    if assignment.trainee_id != user.id && !user.has_permission(Permission::ViewTraineeProgress) {
        return Err(Status::Forbidden);
    }

    let executions = get_executions_for_assignment(db, id).await?;

    Ok(Json(executions))
}

#[derive(Deserialize)]
pub struct StartSessionRequest {
    assignment_id: i64,
}

#[post("/session/start", data = "<request>")]
pub async fn api_start_session(
    request: Json<StartSessionRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    registry: &State<SessionRegistry>,
) -> Result<Json<SessionSnapshot>, AppError> {
    if !user.has_permission(Permission::RecordExecutions) {
        return Err(AppError::Authorization(
            "Only trainees run guided workouts".to_string(),
        ));
    }

    let assignment = get_assignment(db, request.assignment_id).await?;
    if assignment.trainee_id != user.id {
        return Err(AppError::Authorization(
            "Assignment belongs to another trainee".to_string(),
        ));
    }

    let plan = get_plan(db, assignment.plan_id).await?;

    let snapshot = registry.start(user.id, &assignment, plan)?;

    Ok(Json(snapshot))
}

#[get("/session")]
pub async fn api_get_session(
    user: User,
    registry: &State<SessionRegistry>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(registry.snapshot(user.id)?))
}

#[derive(Deserialize)]
pub struct SubmitSetRequest {
    reps: Option<i64>,
    load_kg: Option<f64>,
    note: Option<String>,
}

#[post("/session/set", data = "<request>")]
pub async fn api_submit_set(
    request: Json<SubmitSetRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    registry: &State<SessionRegistry>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let entry = SetEntry {
        reps: request.reps,
        load_kg: request.load_kg,
        note: request.note.clone(),
    };

    let snapshot = registry.submit_set(user.id, entry)?;

    // The final set completes the session: persist the aggregated draft.
    // If the insert fails the session stays completed with its draft
    // retained, and /session/finish can resubmit the identical payload.
    if snapshot.phase == "completed" {
        let draft = registry.completed_execution(user.id)?;
        create_execution(db, user.id, &draft).await?;
        registry.clear_completed(user.id);
    }

    Ok(Json(snapshot))
}

#[post("/session/skip-rest")]
pub async fn api_skip_rest(
    user: User,
    registry: &State<SessionRegistry>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(registry.skip_rest(user.id)?))
}

#[post("/session/previous")]
pub async fn api_previous_exercise(
    user: User,
    registry: &State<SessionRegistry>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(registry.previous_exercise(user.id)?))
}

#[post("/session/abandon")]
pub async fn api_abandon_session(
    user: User,
    registry: &State<SessionRegistry>,
) -> Result<Status, AppError> {
    registry.abandon(user.id)?;
    Ok(Status::Ok)
}

/// Resubmits the retained draft of a completed session whose first
/// submission failed.
#[post("/session/finish")]
pub async fn api_finish_session(
    user: User,
    db: &State<Pool<Sqlite>>,
    registry: &State<SessionRegistry>,
) -> Result<Json<Execution>, AppError> {
    let draft = registry.completed_execution(user.id)?;
    let execution = create_execution(db, user.id, &draft).await?;
    registry.clear_completed(user.id);

    Ok(Json(execution))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
