use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use serde_json::Value;

use crate::db::DbPool;
use crate::error::{done, is_unique_violation, ok, parse_command, ApiError, ApiResult};
use crate::models::category::{Category, CategoryDelete, CategoryForm};
use crate::security::auth::AdminUser;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum CategoryCommand {
    Create {
        name: String,
        description: Option<String>,
    },
    Update {
        id: i64,
        name: String,
        description: Option<String>,
    },
    Delete {
        id: i64,
    },
}

fn require_category(pool: &DbPool, id: i64) -> Result<Category, ApiError> {
    Category::find_by_id(pool, id)?.ok_or(ApiError::NotFound("Category"))
}

/// Trimmed name, non-empty, unique apart from `except`.
fn checked_form(
    pool: &DbPool,
    name: String,
    description: Option<String>,
    except: Option<i64>,
) -> Result<CategoryForm, ApiError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::field("name", "Category name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::field(
            "name",
            format!("Category name must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    if Category::name_taken(pool, &name, except)? {
        return Err(ApiError::Conflict(
            "A category with that name already exists".to_string(),
        ));
    }
    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Ok(CategoryForm { name, description })
}

fn uniqueness(detail: String) -> ApiError {
    if is_unique_violation(&detail) {
        ApiError::Conflict("A category with that name already exists".to_string())
    } else {
        ApiError::Internal(detail)
    }
}

#[get("/categories?<action>&<id>")]
pub fn get_categories(pool: &State<DbPool>, action: Option<&str>, id: Option<i64>) -> ApiResult {
    match action.unwrap_or("all") {
        "all" => ok("Categories retrieved", Category::list(pool)?),
        "single" => {
            let id = id.ok_or_else(|| ApiError::field("id", "Category id is required"))?;
            ok("Category retrieved", require_category(pool, id)?)
        }
        other => Err(ApiError::BadRequest(format!("Unknown action '{}'", other))),
    }
}

#[post("/categories", format = "json", data = "<body>")]
pub fn post_categories(pool: &State<DbPool>, admin: AdminUser, body: Json<Value>) -> ApiResult {
    match parse_command::<CategoryCommand>(body.into_inner())? {
        CategoryCommand::Create { name, description } => {
            let form = checked_form(pool, name, description, None)?;
            let id = Category::create(pool, &form).map_err(uniqueness)?;
            log::info!("Category '{}' created by {}", form.name, admin.user.username);
            ok("Category created", require_category(pool, id)?)
        }
        CategoryCommand::Update {
            id,
            name,
            description,
        } => {
            require_category(pool, id)?;
            let form = checked_form(pool, name, description, Some(id))?;
            if !Category::update(pool, id, &form).map_err(uniqueness)? {
                return Err(ApiError::NotFound("Category"));
            }
            ok("Category updated", require_category(pool, id)?)
        }
        CategoryCommand::Delete { id } => match Category::delete(pool, id)? {
            CategoryDelete::Deleted => {
                log::info!("Category {} deleted by {}", id, admin.user.username);
                done("Category deleted")
            }
            CategoryDelete::NotFound => Err(ApiError::NotFound("Category")),
            CategoryDelete::InUse(n) => Err(ApiError::Conflict(format!(
                "Cannot delete a category that still has {} post(s)",
                n
            ))),
        },
    }
}

pub fn routes() -> Vec<Route> {
    routes![get_categories, post_categories]
}
