use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schema::{
    channel_courses, channels, courses, playlists, quiz_questions, quiz_videos, quizzes,
    services, users, videos,
};

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = channels)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = channels)]
pub struct ChannelChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelWithCourses {
    #[serde(flatten)]
    pub channel: Channel,
    pub courses: Vec<Uuid>,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = courses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = courses)]
pub struct CourseChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWithChannels {
    #[serde(flatten)]
    pub course: Course,
    pub channels: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = channel_courses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChannelCourse {
    pub channel_id: Uuid,
    pub course_id: Uuid,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = playlists)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub playlist_type: String,
    pub link: String,
    pub channel_id: Uuid,
    pub course_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = playlists)]
pub struct PlaylistChanges {
    pub playlist_type: Option<String>,
    pub link: Option<String>,
    pub channel_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = videos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub link: String,
    pub playlist_id: Uuid,
    pub channel_id: Uuid,
    pub course_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = videos)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub link: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = quizzes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub playlist_id: Uuid,
    pub channel_name: String,
    pub course_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = quiz_videos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct QuizVideo {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub video_id: Uuid,
    pub video_title: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = quiz_questions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_video_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = quiz_questions)]
pub struct QuizQuestionChanges {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizVideoWithQuestions {
    #[serde(flatten)]
    pub entry: QuizVideo,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizWithVideos {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub videos: Vec<QuizVideoWithQuestions>,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = services)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub slug: String,
    pub images: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = services)]
pub struct ServiceChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub images: Option<Vec<String>>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// What the API exposes of a [`User`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
