use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::preferences::save_preferences,
        crate::routes::preferences::get_preferences,
        crate::routes::preferences::search_preferences,
        crate::routes::selections::save_checkboxes,
        crate::routes::selections::list_selections,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            crate::routes::preferences::SavePreferencesRequest,
            crate::routes::preferences::PreferenceResponse,
            crate::routes::selections::SaveCheckboxesRequest,
            crate::routes::selections::SaveCheckboxesResponse,
            crate::routes::selections::ChallengeSelectionsResponse,
        )
    ),
    tags(
        (name = "health"),
        (name = "preferences"),
        (name = "selections")
    )
)]
pub struct ApiDoc;
