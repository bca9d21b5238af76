diesel::table! {
    channel_courses (channel_id, course_id) {
        channel_id -> Uuid,
        course_id -> Uuid,
    }
}

diesel::table! {
    channels (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        image_url -> Nullable<Varchar>,
        link -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    courses (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        category -> Nullable<Varchar>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    playlists (id) {
        id -> Uuid,
        playlist_type -> Varchar,
        link -> Varchar,
        channel_id -> Uuid,
        course_id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    quiz_questions (id) {
        id -> Uuid,
        quiz_video_id -> Uuid,
        question -> Text,
        options -> Array<Text>,
        answer -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    quiz_videos (id) {
        id -> Uuid,
        quiz_id -> Uuid,
        video_id -> Uuid,
        video_title -> Varchar,
        created_at -> Timestamp,
    }
}

diesel::table! {
    quizzes (id) {
        id -> Uuid,
        playlist_id -> Uuid,
        channel_name -> Varchar,
        course_name -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    services (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Nullable<Text>,
        slug -> Varchar,
        images -> Array<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        role -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    videos (id) {
        id -> Uuid,
        title -> Varchar,
        link -> Varchar,
        playlist_id -> Uuid,
        channel_id -> Uuid,
        course_id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(channel_courses -> channels (channel_id));
diesel::joinable!(channel_courses -> courses (course_id));
diesel::joinable!(playlists -> channels (channel_id));
diesel::joinable!(playlists -> courses (course_id));
diesel::joinable!(quiz_questions -> quiz_videos (quiz_video_id));
diesel::joinable!(quiz_videos -> quizzes (quiz_id));
diesel::joinable!(quiz_videos -> videos (video_id));
diesel::joinable!(quizzes -> playlists (playlist_id));
diesel::joinable!(videos -> playlists (playlist_id));

diesel::allow_tables_to_appear_in_same_query!(
    channel_courses,
    channels,
    courses,
    playlists,
    quiz_questions,
    quiz_videos,
    quizzes,
    services,
    users,
    videos,
);
