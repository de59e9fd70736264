use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{idea_votes, ideas, profiles, skills, user_favorites, user_votes};

// --- Skills ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = skills)]
pub struct Skill {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub category: Option<String>,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
}

// --- Ideas ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = ideas)]
pub struct Idea {
    pub id: i32,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ideas)]
pub struct NewIdea {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

// --- Votes ---

#[derive(Debug, Insertable)]
#[diesel(table_name = user_votes)]
pub struct NewUserVote {
    pub user_id: Uuid,
    pub skill_id: i32,
    pub vote_type: i16,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = idea_votes)]
pub struct NewIdeaVote {
    pub user_id: Uuid,
    pub idea_id: i32,
    pub vote_type: i16,
}

// --- Favorites ---

#[derive(Debug, Insertable)]
#[diesel(table_name = user_favorites)]
pub struct NewFavorite {
    pub user_id: Uuid,
    pub skill_id: i32,
}

// --- Profiles ---

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub avatar_url: Option<String>,
    #[serde(skip_serializing)]
    pub avatar_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = profiles)]
pub struct ProfileAvatar<'a> {
    pub id: Uuid,
    pub avatar_url: &'a str,
    pub avatar_key: &'a str,
    pub updated_at: DateTime<Utc>,
}
