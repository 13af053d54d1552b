use axum::routing::get;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/session", session_routes())
        .nest("/documents", document_routes(config))
        .nest("/leaderboard", leaderboard_routes())
        .nest("/director", director_routes())
        // Object serving is transport plumbing, kept out of the API docs.
        .route("/files/{*key}", get(handlers::files::serve_file))
}

fn session_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(
        handlers::session::start_session,
        handlers::session::get_scope
    ))
}

fn document_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let browse = OpenApiRouter::new()
        .routes(routes!(handlers::documents::list_documents))
        .routes(routes!(handlers::documents::popular_documents))
        .routes(routes!(handlers::documents::recent_documents))
        .routes(routes!(handlers::documents::my_documents))
        .routes(routes!(
            handlers::documents::get_document,
            handlers::documents::delete_document
        ))
        .routes(routes!(handlers::documents::download_document))
        .routes(routes!(handlers::documents::moderate_document))
        .routes(routes!(
            handlers::documents::rate_document,
            handlers::documents::get_rating
        ));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::documents::submit_document))
        .layer(handlers::documents::submit_body_limit(
            config.storage.max_upload_size,
        ));

    browse.merge(upload)
}

fn leaderboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::leaderboard::get_leaderboard))
}

fn director_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::director::director_stats))
        .routes(routes!(handlers::director::university_documents))
        .routes(routes!(handlers::director::university_professors))
}
