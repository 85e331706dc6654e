//! OpenAPI document assembly, mounted at `/swagger-ui`.

use utoipa::OpenApi;

use crate::dto::{ErrorBody, ExecuteRequestDto, ExecuteResponseDto, PublicKeyResponse, UsageDto};
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::ping,
        handlers::keys::get_public_key,
        handlers::execute::execute_task,
        handlers::usage::get_usage,
    ),
    components(schemas(
        PublicKeyResponse,
        ExecuteRequestDto,
        ExecuteResponseDto,
        UsageDto,
        ErrorBody,
    )),
    tags(
        (name = "General", description = "Unauthenticated liveness"),
        (name = "Keys", description = "Server identity"),
        (name = "Execute", description = "Sealed inference tasks"),
        (name = "Usage", description = "Quota introspection"),
    )
)]
pub struct ApiDoc;
