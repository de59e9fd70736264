use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;

use skealed_shared::errors::{AppError, AppResult};
use skealed_shared::middleware::OptionalAuthUser;
use skealed_shared::types::ApiResponse;

use crate::models::Skill;
use crate::routes::skills::{cards_for, ListQuery};
use crate::schema::skills;
use crate::services::listing::{self, CategorySection, GENERAL_CATEGORY};
use crate::AppState;

/// Escapes LIKE wildcards so the title matches literally.
fn like_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Skills without a category are listed under General, next to any spelled that way.
fn files_under_general(category: Option<&str>) -> bool {
    category
        .map(str::trim)
        .map_or(true, |c| c.is_empty() || c.eq_ignore_ascii_case(GENERAL_CATEGORY))
}

/// GET /categories/:slug?q=&sort=
pub async fn category_page(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<CategorySection>>> {
    let sort = query.sort_mode()?;
    let title = listing::category_title(&slug);

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let members = if title.eq_ignore_ascii_case(GENERAL_CATEGORY) {
        let mut all = skills::table
            .order((skills::votes.desc(), skills::id.asc()))
            .load::<Skill>(&mut conn)?;
        all.retain(|s| files_under_general(s.category.as_deref()));
        all
    } else {
        skills::table
            .filter(skills::category.ilike(like_literal(&title)))
            .order((skills::votes.desc(), skills::id.asc()))
            .load::<Skill>(&mut conn)?
    };

    // Stored spelling wins over the one rebuilt from the slug.
    let name = members
        .iter()
        .find_map(|s| s.category.clone().filter(|c| !c.trim().is_empty()))
        .unwrap_or(title);
    let cards = cards_for(&mut conn, user.as_ref(), members)?;

    Ok(Json(ApiResponse::ok(CategorySection {
        icon: listing::category_icon(&name),
        slug: listing::category_slug(&name),
        skills: listing::process(cards, &query.q, sort),
        name,
        sort,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(like_literal("Ai Literacy"), "Ai Literacy");
        assert_eq!(like_literal("100%_sure"), "100\\%\\_sure");
    }

    #[test]
    fn uncategorised_skills_belong_to_general() {
        assert!(files_under_general(None));
        assert!(files_under_general(Some("   ")));
        assert!(files_under_general(Some("general")));
        assert!(!files_under_general(Some("Security")));
        assert_eq!(listing::category_title(&listing::category_slug(GENERAL_CATEGORY)), GENERAL_CATEGORY);
    }
}
