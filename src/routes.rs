// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, exams, questions, sessions, submissions},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: registration and login.
/// * Authenticated: exam listing, exam sessions, own submissions.
/// * Admin: question bank, exam authoring, per-exam results.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let student_routes = Router::new()
        .route("/exams", get(exams::list_exams))
        .route("/exams/{id}", get(exams::get_exam))
        .route("/exams/{id}/sessions", post(exams::start_session))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}/answer", post(sessions::answer))
        .route("/sessions/{id}/review", post(sessions::mark_for_review))
        .route("/sessions/{id}/clear", post(sessions::clear_answer))
        .route("/sessions/{id}/navigate", post(sessions::navigate))
        .route("/sessions/{id}/break", post(sessions::toggle_break))
        .route("/sessions/{id}/submit", post(sessions::submit))
        .route("/submissions/me", get(submissions::my_submissions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/questions",
            post(questions::create_question).get(questions::search_questions),
        )
        .route(
            "/questions/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/exams", post(exams::create_exam))
        .route(
            "/exams/{id}",
            get(exams::get_exam_definition).delete(exams::delete_exam),
        )
        .route("/exams/{id}/submissions", get(submissions::exam_submissions))
        // Auth runs first (outermost), then the admin check
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
                .layer(middleware::from_fn(admin_middleware)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", student_routes)
        .nest("/api/admin", admin_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}
