use actix_web::{web, HttpResponse};

use crate::api::auth::AuthUser;
use crate::api::shared::ok;
use crate::error::AppResult;
use crate::services::interview::{CodingRequest, LlmClient, QuestionsRequest};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/interview")
            .route("/questions", web::post().to(generate_questions))
            .route("/coding", web::post().to(generate_coding_problem)),
    );
}

pub async fn generate_questions(
    user: AuthUser,
    body: web::Json<QuestionsRequest>,
    llm: web::Data<LlmClient>,
) -> AppResult<HttpResponse> {
    body.validate()?;
    log::info!(
        "User {} requested {} questions for {}",
        user.id,
        body.count(),
        body.role.trim()
    );

    let set = llm.generate_questions(&body).await?;
    Ok(ok(set))
}

pub async fn generate_coding_problem(
    user: AuthUser,
    body: web::Json<CodingRequest>,
    llm: web::Data<LlmClient>,
) -> AppResult<HttpResponse> {
    body.validate()?;
    log::info!("User {} requested a coding problem on {}", user.id, body.topic.trim());

    let problem = llm.generate_coding_problem(&body).await?;
    Ok(ok(serde_json::json!({ "problem": problem })))
}
