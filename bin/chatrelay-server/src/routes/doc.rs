use crate::routes::{health, relay};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "chatrelay-server",
    description = "Chat relay in front of a generative-language API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(relay::RelayApi::openapi());
    root
}
