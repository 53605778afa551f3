use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::{admin, auth, todo};
use crate::pages;
use crate::telemetry;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/todo.create", post(todo::create))
        .route("/todo.getAll", get(todo::get_all).post(todo::get_all))
        .route("/todo.update", post(todo::update))
        .route("/todo.delete", post(todo::delete))
        .route("/todo.toggleComplete", post(todo::toggle_complete))
        .route("/todo.updateStatus", post(todo::update_status))
        .route("/auth.signup", post(auth::signup))
        .route("/auth.login", post(auth::login))
        .route("/auth.me", get(auth::me).post(auth::me))
        .route("/auth.forgotpassword", post(auth::forgot_password))
        .route("/auth.resetpassword", post(auth::reset_password))
        .route("/admin.getUsers", get(admin::get_users).post(admin::get_users))
        .route("/admin.updateUserRole", post(admin::update_user_role))
        .route("/admin.deleteTask", post(admin::delete_task))
        .route("/admin.getUserPermissions", post(admin::get_user_permissions))
        .route(
            "/admin.getActivityLogs",
            get(admin::get_activity_logs).post(admin::get_activity_logs),
        );

    let pages = Router::new()
        .route("/", get(pages::page))
        .route("/auth/*rest", get(pages::page))
        .route("/reset-password", get(pages::page))
        .route("/todo", get(pages::page))
        .route("/todo/*rest", get(pages::page))
        .route("/settings", get(pages::page))
        .route("/admin", get(pages::page))
        .route("/admin/*rest", get(pages::page))
        .route_layer(middleware::from_fn_with_state(state.clone(), pages::route_guard));

    Router::new()
        .nest("/api", api)
        .merge(pages)
        .layer(middleware::from_fn(telemetry::log_requests))
        .with_state(state)
}
