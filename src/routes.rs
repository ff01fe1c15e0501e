// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{application, opportunity, profile, quiz},
    state::AppState,
    utils::jwt::{
        auth_middleware, candidate_middleware, optional_auth_middleware, recruiter_middleware,
    },
};

/// Assembles the main application router.
///
/// * Nests one sub-router per entity family.
/// * Gated groups stack their role check on top of the auth check; layers run
///   outside-in, so auth always verifies the token before the role is read.
/// * Applies global middleware (Trace, CORS) and injects the shared state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let opportunity_routes = Router::new()
        .route("/", get(opportunity::list_opportunities))
        .merge(
            Router::new()
                .route("/{id}", get(opportunity::get_opportunity))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    optional_auth_middleware,
                )),
        )
        .merge(
            Router::new()
                .route(
                    "/recruiter/{recruiter_id}",
                    get(opportunity::list_by_recruiter),
                )
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route("/", post(opportunity::create_opportunity))
                .route(
                    "/{id}",
                    put(opportunity::update_opportunity).delete(opportunity::delete_opportunity),
                )
                .route("/{id}/status", put(opportunity::update_opportunity_status))
                .route_layer(middleware::from_fn(recruiter_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let application_routes = Router::new()
        .merge(
            Router::new()
                .route("/", post(application::create_application))
                .route("/mine", get(application::list_by_candidate))
                .route("/{id}/withdraw", post(application::withdraw_application))
                .route_layer(middleware::from_fn(candidate_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route("/{id}", get(application::get_application))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route(
                    "/opportunity/{opportunity_id}",
                    get(application::list_by_opportunity),
                )
                .route("/{id}/status", put(application::update_application_status))
                .route_layer(middleware::from_fn(recruiter_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let quiz_routes = Router::new()
        .merge(
            Router::new()
                .route("/", post(quiz::create_quiz))
                .route("/{id}", put(quiz::update_quiz))
                .route_layer(middleware::from_fn(recruiter_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route("/opportunity/{opportunity_id}", get(quiz::get_by_opportunity))
                .route("/attempts/{attempt_id}", get(quiz::get_attempt_result))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route("/{id}/attempt", post(quiz::get_for_attempt))
                .route("/attempts/{attempt_id}/submit", post(quiz::submit_attempt))
                .route(
                    "/attempts/{attempt_id}/tab-switch",
                    post(quiz::record_tab_switch),
                )
                .route_layer(middleware::from_fn(candidate_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let profile_routes = Router::new()
        .merge(
            Router::new()
                .route("/me", get(profile::get_me).put(profile::update_me))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .route("/{user_id}", get(profile::get_public_profile));

    Router::new()
        .nest("/api/opportunities", opportunity_routes)
        .nest("/api/applications", application_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/profile", profile_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
