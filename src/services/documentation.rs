use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the hit timeline backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::game_stream,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::join_game,
        crate::routes::game::leave_game,
        crate::routes::game::start_game,
        crate::routes::game::abort_game,
        crate::routes::turn::guess_release_year,
        crate::routes::turn::guess_credits,
        crate::routes::turn::pass_turn,
        crate::routes::turn::exchange_track,
        crate::routes::turn::buy_track,
        crate::routes::turn::complete_turn,
        crate::routes::turn::propose_correction,
        crate::routes::turn::vote_correction,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::sse::Handshake,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::ReleaseYearGuessRequest,
            crate::dto::game::CreditsGuessRequest,
            crate::dto::game::RevisionRequest,
            crate::dto::game::CorrectionRequest,
            crate::dto::game::CorrectionVoteRequest,
            crate::dto::game::CommandResponse,
            crate::state::game::Game,
            crate::state::game::GameSettings,
            crate::state::game::Player,
            crate::state::game::Track,
            crate::state::game::Turn,
            crate::state::game::Scoring,
            crate::state::game::CorrectionProposal,
            crate::state::state_machine::GamePhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "game", description = "Game lobby and lifecycle"),
        (name = "turn", description = "Actions on the current turn"),
    )
)]
/// OpenAPI document of every route.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/games",
            "/games/{id}",
            "/games/{id}/events",
            "/games/{id}/turn/correction/vote",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
