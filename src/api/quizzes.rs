use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::auth::AdminUser;
use crate::api::shared::{created, ok, required, Deleted};
use crate::db::models::{
    Quiz, QuizQuestion, QuizQuestionChanges, QuizVideo, QuizVideoWithQuestions, QuizWithVideos,
};
use crate::db::schema::{quiz_questions, quiz_videos, quizzes, videos};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/quizzes")
            .route("", web::get().to(list_quizzes))
            .route("", web::post().to(add_questions))
            .route("/playlist/{playlist_id}", web::get().to(get_quiz_by_playlist))
            .route("/{id}", web::get().to(get_quiz))
            .route("/{id}", web::delete().to(delete_quiz))
            .route("/{id}/videos/{entry_id}", web::delete().to(remove_video_entry))
            .route("/{id}/questions/{question_id}", web::put().to(update_question))
            .route("/{id}/questions/{question_id}", web::delete().to(remove_question)),
    );
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuestionInput {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddQuestions {
    pub playlist_id: Uuid,
    pub channel_name: String,
    pub course_name: String,
    pub video_id: Uuid,
    pub video_title: String,
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionUpdate {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<String>,
}

/// Returns the trimmed question; the answer must be one of at least two options.
pub fn validate_question(input: &QuestionInput) -> AppResult<QuestionInput> {
    let question = required("question", &input.question)?;
    let options: Vec<String> = input
        .options
        .iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if options.len() < 2 {
        return Err(AppError::BadRequest(
            "A question needs at least two options".to_string(),
        ));
    }
    let answer = input.answer.trim().to_string();
    if !options.contains(&answer) {
        return Err(AppError::BadRequest(format!(
            "Answer '{}' is not one of the options",
            answer
        )));
    }
    Ok(QuestionInput {
        question,
        options,
        answer,
    })
}

/// Nests entries under their quiz and questions under their entry, oldest first.
pub fn assemble(
    quiz_list: Vec<Quiz>,
    entries: Vec<QuizVideo>,
    questions: Vec<QuizQuestion>,
) -> Vec<QuizWithVideos> {
    let mut questions_by_entry: HashMap<Uuid, Vec<QuizQuestion>> = HashMap::new();
    for q in questions {
        questions_by_entry.entry(q.quiz_video_id).or_default().push(q);
    }

    let mut entries_by_quiz: HashMap<Uuid, Vec<QuizVideoWithQuestions>> = HashMap::new();
    for entry in entries {
        let mut questions = questions_by_entry.remove(&entry.id).unwrap_or_default();
        questions.sort_by_key(|q| q.created_at);
        entries_by_quiz
            .entry(entry.quiz_id)
            .or_default()
            .push(QuizVideoWithQuestions { entry, questions });
    }

    quiz_list
        .into_iter()
        .map(|quiz| {
            let mut videos = entries_by_quiz.remove(&quiz.id).unwrap_or_default();
            videos.sort_by_key(|v| v.entry.created_at);
            QuizWithVideos { quiz, videos }
        })
        .collect()
}

async fn load_tree(conn: &mut AsyncPgConnection, quiz_list: Vec<Quiz>) -> AppResult<Vec<QuizWithVideos>> {
    let quiz_ids: Vec<Uuid> = quiz_list.iter().map(|q| q.id).collect();
    let entries = quiz_videos::table
        .filter(quiz_videos::quiz_id.eq_any(quiz_ids))
        .select(QuizVideo::as_select())
        .load::<QuizVideo>(conn)
        .await?;

    let entry_ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    let questions = quiz_questions::table
        .filter(quiz_questions::quiz_video_id.eq_any(entry_ids))
        .select(QuizQuestion::as_select())
        .load::<QuizQuestion>(conn)
        .await?;

    Ok(assemble(quiz_list, entries, questions))
}

async fn load_one(conn: &mut AsyncPgConnection, quiz: Quiz) -> AppResult<QuizWithVideos> {
    load_tree(conn, vec![quiz])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Quiz".to_string()))
}

async fn find_quiz(conn: &mut AsyncPgConnection, id: Uuid) -> AppResult<Quiz> {
    quizzes::table
        .find(id)
        .select(Quiz::as_select())
        .first::<Quiz>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Quiz".to_string()))
}

async fn find_question(
    conn: &mut AsyncPgConnection,
    quiz_id: Uuid,
    question_id: Uuid,
) -> AppResult<QuizQuestion> {
    quiz_questions::table
        .inner_join(quiz_videos::table)
        .filter(quiz_questions::id.eq(question_id))
        .filter(quiz_videos::quiz_id.eq(quiz_id))
        .select(QuizQuestion::as_select())
        .first::<QuizQuestion>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Question".to_string()))
}

async fn touch(conn: &mut AsyncPgConnection, quiz_id: Uuid) -> AppResult<()> {
    diesel::update(quizzes::table.find(quiz_id))
        .set(quizzes::updated_at.eq(Utc::now().naive_utc()))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_quizzes(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let quiz_list = quizzes::table
        .order_by(quizzes::created_at.desc())
        .select(Quiz::as_select())
        .load::<Quiz>(&mut conn)
        .await?;

    Ok(ok(load_tree(&mut conn, quiz_list).await?))
}

pub async fn get_quiz(path: web::Path<Uuid>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let quiz = find_quiz(&mut conn, path.into_inner()).await?;
    Ok(ok(load_one(&mut conn, quiz).await?))
}

pub async fn get_quiz_by_playlist(
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let mut conn = pool.get().await?;
    let quiz = quizzes::table
        .filter(quizzes::playlist_id.eq(path.into_inner()))
        .select(Quiz::as_select())
        .first::<Quiz>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::NotFound("Quiz".to_string()))?;

    Ok(ok(load_one(&mut conn, quiz).await?))
}

/// Upserts the playlist's quiz, then appends to the video's entry (creating it if needed).
pub async fn add_questions(
    _admin: AdminUser,
    body: web::Json<AddQuestions>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let channel_name = required("channelName", &body.channel_name)?;
    let course_name = required("courseName", &body.course_name)?;
    let video_title = required("videoTitle", &body.video_title)?;
    if body.questions.is_empty() {
        return Err(AppError::BadRequest("questions must not be empty".to_string()));
    }
    let questions = body
        .questions
        .iter()
        .map(validate_question)
        .collect::<AppResult<Vec<_>>>()?;
    let (playlist_id, video_id) = (body.playlist_id, body.video_id);

    let mut conn = pool.get().await?;
    let conn: &mut AsyncPgConnection = &mut conn;
    let quiz = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let owner = videos::table
                    .find(video_id)
                    .select(videos::playlist_id)
                    .first::<Uuid>(conn)
                    .await
                    .optional()?;
                if owner != Some(playlist_id) {
                    return Err(AppError::BadRequest(format!(
                        "Video {} is not in playlist {}",
                        video_id, playlist_id
                    )));
                }

                let now = Utc::now().naive_utc();
                let quiz = diesel::insert_into(quizzes::table)
                    .values(&Quiz {
                        id: Uuid::new_v4(),
                        playlist_id,
                        channel_name,
                        course_name,
                        created_at: now,
                        updated_at: now,
                    })
                    .on_conflict(quizzes::playlist_id)
                    .do_update()
                    .set((
                        quizzes::channel_name.eq(excluded(quizzes::channel_name)),
                        quizzes::course_name.eq(excluded(quizzes::course_name)),
                        quizzes::updated_at.eq(now),
                    ))
                    .returning(Quiz::as_returning())
                    .get_result::<Quiz>(conn)
                    .await?;

                let entry = diesel::insert_into(quiz_videos::table)
                    .values(&QuizVideo {
                        id: Uuid::new_v4(),
                        quiz_id: quiz.id,
                        video_id,
                        video_title,
                        created_at: now,
                    })
                    .on_conflict((quiz_videos::quiz_id, quiz_videos::video_id))
                    .do_update()
                    .set(quiz_videos::video_title.eq(excluded(quiz_videos::video_title)))
                    .returning(QuizVideo::as_returning())
                    .get_result::<QuizVideo>(conn)
                    .await?;

                let rows: Vec<QuizQuestion> = questions
                    .into_iter()
                    .map(|q| QuizQuestion {
                        id: Uuid::new_v4(),
                        quiz_video_id: entry.id,
                        question: q.question,
                        options: q.options,
                        answer: q.answer,
                        created_at: now,
                    })
                    .collect();
                diesel::insert_into(quiz_questions::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;

                log::info!(
                    "Added {} questions to quiz {} video {}",
                    rows.len(),
                    quiz.id,
                    video_id
                );
                load_one(conn, quiz).await
            }
            .scope_boxed()
        })
        .await?;

    Ok(created(quiz))
}

pub async fn delete_quiz(
    _admin: AdminUser,
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let mut conn = pool.get().await?;

    let deleted = diesel::delete(quizzes::table.find(id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Quiz".to_string()));
    }

    Ok(ok(Deleted { id }))
}

/// Pulls one video entry (and its questions) out of a quiz.
pub async fn remove_video_entry(
    _admin: AdminUser,
    path: web::Path<(Uuid, Uuid)>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let (quiz_id, entry_id) = path.into_inner();
    let mut conn = pool.get().await?;

    let deleted = diesel::delete(
        quiz_videos::table
            .filter(quiz_videos::id.eq(entry_id))
            .filter(quiz_videos::quiz_id.eq(quiz_id)),
    )
    .execute(&mut conn)
    .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Quiz video".to_string()));
    }
    touch(&mut conn, quiz_id).await?;

    let quiz = find_quiz(&mut conn, quiz_id).await?;
    Ok(ok(load_one(&mut conn, quiz).await?))
}

pub async fn update_question(
    _admin: AdminUser,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<QuestionUpdate>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let (quiz_id, question_id) = path.into_inner();
    let body = body.into_inner();

    let mut conn = pool.get().await?;
    let existing = find_question(&mut conn, quiz_id, question_id).await?;

    let merged = validate_question(&QuestionInput {
        question: body.question.unwrap_or(existing.question),
        options: body.options.unwrap_or(existing.options),
        answer: body.answer.unwrap_or(existing.answer),
    })?;
    let changes = QuizQuestionChanges {
        question: Some(merged.question),
        options: Some(merged.options),
        answer: Some(merged.answer),
    };

    let updated = diesel::update(quiz_questions::table.find(question_id))
        .set(&changes)
        .returning(QuizQuestion::as_returning())
        .get_result::<QuizQuestion>(&mut conn)
        .await?;
    touch(&mut conn, quiz_id).await?;

    Ok(ok(updated))
}

pub async fn remove_question(
    _admin: AdminUser,
    path: web::Path<(Uuid, Uuid)>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let (quiz_id, question_id) = path.into_inner();
    let mut conn = pool.get().await?;

    find_question(&mut conn, quiz_id, question_id).await?;
    diesel::delete(quiz_questions::table.find(question_id))
        .execute(&mut conn)
        .await?;
    touch(&mut conn, quiz_id).await?;

    Ok(ok(Deleted { id: question_id }))
}
