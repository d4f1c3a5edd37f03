use super::handlers::{
    activity, announcements, auth, contact, events, feedback, files, health, notes, subjects,
    tips, users,
};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers sharing a path must
/// share one `routes!` call. Routes added outside (like `/` and the
/// preflight `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::otp::generate_otp))
        .routes(routes!(auth::otp::verify_otp))
        .routes(routes!(auth::signup::signup))
        .routes(routes!(auth::signup::check_admin))
        .routes(routes!(auth::signin::signin))
        .routes(routes!(users::list_users))
        .routes(routes!(users::delete_user))
        .routes(routes!(notes::upload_note))
        .routes(routes!(notes::list_notes))
        .routes(routes!(notes::list_pending_notes))
        .routes(routes!(notes::approve_note))
        .routes(routes!(notes::approve_notes))
        .routes(routes!(notes::delete_note))
        .routes(routes!(tips::create_tip))
        .routes(routes!(tips::list_tips))
        .routes(routes!(tips::list_pending_tips))
        .routes(routes!(tips::moderate_tip))
        .routes(routes!(tips::moderate_tips))
        .routes(routes!(tips::delete_tip))
        .routes(routes!(files::upload_file))
        .routes(routes!(files::list_files))
        .routes(routes!(files::list_pending_files))
        .routes(routes!(files::approve_file))
        .routes(routes!(files::approve_files))
        .routes(routes!(files::delete_file))
        .routes(routes!(subjects::create_subject))
        .routes(routes!(subjects::list_subjects))
        .routes(routes!(subjects::update_subject, subjects::delete_subject))
        .routes(routes!(events::create_event))
        .routes(routes!(events::list_events))
        .routes(routes!(events::delete_event))
        .routes(routes!(announcements::create_announcement))
        .routes(routes!(announcements::list_announcements))
        .routes(routes!(announcements::delete_announcement))
        .routes(routes!(feedback::create_feedback, feedback::list_feedback))
        .routes(routes!(feedback::delete_feedback))
        .routes(routes!(contact::contact))
        .routes(routes!(activity::list_activities));

    let tags = [
        ("users", "Signup, sign-in and account administration"),
        ("notes", "Note uploads and moderation"),
        ("tips", "Study tips and moderation"),
        ("files", "Study material files and moderation"),
        ("subjects", "Subject reference data"),
        ("events", "Campus events"),
        ("announcements", "Announcements"),
        ("feedback", "Feedback on notes and tips"),
        ("contact", "Public contact form"),
        ("activity", "Admin audit trail"),
        ("health", "Service health"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tag
    })
    .collect();

    router.get_openapi_mut().tags = Some(tags);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    OpenApiBuilder::new().info(info).build()
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
