use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};

use crate::extract::resolve_principal;
use crate::models::Role;
use crate::AppState;

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Pass,
    Redirect(&'static str),
}

/// Decides whether a page request may proceed given the caller's role, if signed in.
pub fn gate(path: &str, session: Option<Role>) -> Gate {
    if under(path, "/auth") {
        return match session {
            Some(_) => Gate::Redirect("/"),
            None => Gate::Pass,
        };
    }

    let protected = under(path, "/todo") || under(path, "/settings") || under(path, "/admin");
    if !protected {
        return Gate::Pass;
    }

    match session {
        None => Gate::Redirect(LOGIN_PATH),
        Some(role) if under(path, "/admin") && !role.is_staff() => Gate::Redirect("/"),
        Some(_) => Gate::Pass,
    }
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let role = match resolve_principal(request.headers(), &state) {
        Ok(principal) => Some(principal.role),
        Err(e) => {
            tracing::debug!(error = %e, "page request without session");
            None
        }
    };

    match gate(request.uri().path(), role) {
        Gate::Pass => next.run(request).await,
        Gate::Redirect(to) => redirect(to),
    }
}

fn redirect(to: &'static str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, to)]).into_response()
}

fn title_for(path: &str) -> Option<&'static str> {
    let title = match path {
        "/" => "Home",
        "/auth/login" => "Sign in",
        "/auth/signup" => "Sign up",
        "/auth/forgot-password" => "Forgot password",
        "/reset-password" => "Reset password",
        "/todo/todohome" => "My tasks",
        "/todo/tasks" => "Board",
        "/settings" => "Settings",
        "/admin" => "Admin",
        _ => return None,
    };
    Some(title)
}

/// Minimal shell; the client application renders into `#app`.
pub async fn page(uri: Uri) -> Response {
    let Some(title) = title_for(uri.path()) else {
        return (StatusCode::NOT_FOUND, Html("<!doctype html><title>Not found</title>")).into_response();
    };

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>taskboard · {title}</title>
</head>
<body>
  <div id="app" data-page="{path}"><h1>{title}</h1></div>
</body>
</html>"#,
        title = html_escape(title),
        path = html_escape(uri.path()),
    ))
    .into_response()
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_pages_bounce_signed_in_users() {
        assert_eq!(gate("/auth/login", None), Gate::Pass);
        assert_eq!(gate("/auth/login", Some(Role::User)), Gate::Redirect("/"));
    }

    #[test]
    fn protected_prefixes_need_a_session() {
        for path in ["/todo/tasks", "/todo", "/settings", "/admin"] {
            assert_eq!(gate(path, None), Gate::Redirect(LOGIN_PATH), "{path}");
        }
        assert_eq!(gate("/todo/tasks", Some(Role::User)), Gate::Pass);
        assert_eq!(gate("/settings", Some(Role::User)), Gate::Pass);
    }

    #[test]
    fn admin_pages_need_staff() {
        assert_eq!(gate("/admin", Some(Role::User)), Gate::Redirect("/"));
        assert_eq!(gate("/admin/users", Some(Role::Subadmin)), Gate::Pass);
        assert_eq!(gate("/admin", Some(Role::Admin)), Gate::Pass);
    }

    #[test]
    fn prefixes_match_whole_segments() {
        assert_eq!(gate("/", None), Gate::Pass);
        assert_eq!(gate("/reset-password", None), Gate::Pass);
        assert_eq!(gate("/administrator", None), Gate::Pass);
        assert_eq!(gate("/todos", None), Gate::Pass);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<a href=\"x\">'&'</a>"), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
