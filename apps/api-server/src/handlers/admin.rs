//! Administrative changelist endpoint.

use std::str::FromStr;

use actix_web::{HttpResponse, web};

use blog_core::admin::{ChangeList, ChangeListParams};
use blog_core::query::PostField;

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn number<T: FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("'{key}' must be a number, got '{raw}'")))
}

/// Read changelist parameters: `q`, `page`, `year`, `month`, `day`,
/// `facets` and one key per list filter (`status=DF`, `publish=this_month`).
fn changelist_params(
    list_filter: &[PostField],
    pairs: &[(String, String)],
) -> AppResult<ChangeListParams> {
    let mut params = ChangeListParams::default();
    for (key, value) in pairs {
        match key.as_str() {
            "q" => params.search = Some(value.clone()),
            "page" => params.page = number(key, value)?,
            "year" => params.year = Some(number(key, value)?),
            "month" => params.month = Some(number(key, value)?),
            "day" => params.day = Some(number(key, value)?),
            "facets" => params.facets = matches!(value.as_str(), "1" | "true" | "yes"),
            other => {
                let field = list_filter
                    .iter()
                    .copied()
                    .find(|f| f.name() == other)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown parameter '{other}'")))?;
                params.filters.push((field, value.clone()));
            }
        }
    }
    Ok(params)
}

/// GET /api/admin/posts
pub async fn changelist(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
) -> AppResult<HttpResponse> {
    let params = changelist_params(&state.admin.list_filter, &query)?;
    let page = ChangeList::load(
        &state.admin,
        state.posts.as_ref(),
        state.users.as_ref(),
        &params,
        chrono::Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_core::admin::PostAdmin;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_changelist_params() {
        let admin = PostAdmin::default();
        let params = changelist_params(
            &admin.list_filter,
            &pairs(&[
                ("q", "django"),
                ("status", "PB"),
                ("publish", "this_year"),
                ("year", "2025"),
                ("page", "2"),
            ]),
        )
        .unwrap();
        assert_eq!(params.search.as_deref(), Some("django"));
        assert_eq!(params.year, Some(2025));
        assert_eq!(params.page, 2);
        assert_eq!(
            params.filters,
            vec![
                (PostField::Status, "PB".to_string()),
                (PostField::Publish, "this_year".to_string())
            ]
        );
    }

    #[test]
    fn test_changelist_params_rejects_unknown_keys() {
        let admin = PostAdmin::default();
        assert!(changelist_params(&admin.list_filter, &pairs(&[("title", "x")])).is_err());
        assert!(changelist_params(&admin.list_filter, &pairs(&[("year", "soon")])).is_err());
    }
}
