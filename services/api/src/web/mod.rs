pub mod failure;
pub mod middleware;
pub mod numbers;
pub mod polls;
pub mod signature;
pub mod state;
pub mod voters;
pub mod webhook;

// Re-export the handlers the binary wires into the router.
pub use middleware::require_auth;
pub use numbers::available_numbers_handler;
pub use polls::{
    create_poll_handler, delete_poll_handler, get_poll_handler, list_polls_handler,
    update_poll_handler,
};
pub use voters::{register_voter_handler, verify_voter_handler};
pub use webhook::vote_webhook_handler;

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer scheme the protected paths reference.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// The master definition for the OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        polls::create_poll_handler,
        polls::get_poll_handler,
        polls::list_polls_handler,
        polls::update_poll_handler,
        polls::delete_poll_handler,
        numbers::available_numbers_handler,
        voters::register_voter_handler,
        voters::verify_voter_handler,
        webhook::vote_webhook_handler,
    ),
    components(
        schemas(
            polls::CreatePollRequest,
            polls::UpdatePollRequest,
            polls::PollSummary,
            polls::PollView,
            numbers::PoolNumber,
            voters::RegisterRequest,
            voters::VerifyRequest,
            voters::RegisterResponse,
            voters::VerifyResponse,
        )
    ),
    tags(
        (name = "TextPoll API", description = "Polls with voting over SMS and the web.")
    )
)]
pub struct ApiDoc;
