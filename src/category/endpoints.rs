//! Route handlers for managing categories.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, Error, UserID,
    category::{
        Category, CategoryData, CategoryId, CategoryName, create_category, delete_category,
        get_all_categories, get_category, update_category,
    },
    extract::{JsonBody, PathParam},
};

/// The state needed for managing categories.
#[derive(Debug, Clone)]
pub struct CategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// List the caller's categories ordered by name.
pub async fn list_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_all_categories(&user_id, &connection)?;

    Ok(Json(json!({ "categories": categories })))
}

/// Create a category from a name, type and colour.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(data): JsonBody<CategoryData>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let (Some(name), Some(category_type), Some(color)) = (data.name, data.category_type, data.color)
    else {
        return Err(Error::MissingFields);
    };

    if color.trim().is_empty() {
        return Err(Error::MissingFields);
    }

    let name = CategoryName::new(&name)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(name, category_type, color.trim(), &user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Get one of the caller's categories.
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    PathParam(category_id): PathParam<CategoryId>,
) -> Result<Json<Category>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_category(category_id, &user_id, &connection).map(Json)
}

/// Change the name, type or colour of a category. Fields that are not supplied are left as is.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    PathParam(category_id): PathParam<CategoryId>,
    JsonBody(data): JsonBody<CategoryData>,
) -> Result<Json<Category>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let mut category = get_category(category_id, &user_id, &connection)?;

    if let Some(name) = data.name {
        category.name = CategoryName::new(&name)?;
    }

    if let Some(category_type) = data.category_type {
        category.category_type = category_type;
    }

    if let Some(color) = data.color {
        category.color = color.trim().to_owned();
    }

    update_category(&category, &connection)?;

    Ok(Json(category))
}

/// Delete one of the caller's categories.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    PathParam(category_id): PathParam<CategoryId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    delete_category(category_id, &user_id, &connection)?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod category_endpoint_tests {
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{TestClient, get_test_client},
    };

    async fn create_food_category(client: &TestClient) -> Value {
        let response = client
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Food", "type": "EXPENSE", "color": "#FF0000"}))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    async fn create_and_list_categories() {
        let client = get_test_client();
        let category = create_food_category(&client).await;

        assert_eq!(category["name"], "Food");
        assert_eq!(category["type"], "EXPENSE");
        assert_eq!(category["color"], "#FF0000");
        assert_eq!(category["userId"], client.user_id.as_str());

        let response = client.get(endpoints::CATEGORIES).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "categories": [category] }));
    }

    #[tokio::test]
    async fn create_category_with_missing_fields_fails() {
        let client = get_test_client();

        let response = client
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Food", "type": "EXPENSE"}))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({"error": "Missing required fields"}));
    }

    #[tokio::test]
    async fn create_duplicate_category_is_conflict() {
        let client = get_test_client();
        create_food_category(&client).await;

        let response = client
            .post(endpoints::CATEGORIES)
            .json(&json!({"name": "Food", "type": "EXPENSE", "color": "#000000"}))
            .await;

        response.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn patch_category_changes_only_given_fields() {
        let client = get_test_client();
        let category = create_food_category(&client).await;
        let id = category["id"].as_i64().unwrap();

        let response = client
            .patch(&format_endpoint(endpoints::CATEGORY, id))
            .json(&json!({"color": "#00FF00"}))
            .await;

        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["name"], "Food");
        assert_eq!(updated["color"], "#00FF00");
    }

    #[tokio::test]
    async fn other_users_cannot_see_category() {
        let client = get_test_client();
        let category = create_food_category(&client).await;
        let id = category["id"].as_i64().unwrap();

        client
            .get_as_other_user(&format_endpoint(endpoints::CATEGORY, id))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_category_succeeds() {
        let client = get_test_client();
        let category = create_food_category(&client).await;
        let id = category["id"].as_i64().unwrap();

        let response = client
            .delete(&format_endpoint(endpoints::CATEGORY, id))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"success": true}));
        client
            .get(&format_endpoint(endpoints::CATEGORY, id))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_category_in_use_is_conflict() {
        let client = get_test_client();
        let category = create_food_category(&client).await;
        let id = category["id"].as_i64().unwrap();
        client
            .post(endpoints::TRANSACTIONS)
            .json(&json!({
                "amount": 4.5,
                "type": "EXPENSE",
                "categoryId": id,
                "description": "Coffee",
                "date": "2024-03-01"
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = client
            .delete(&format_endpoint(endpoints::CATEGORY, id))
            .await;

        response.assert_status(axum::http::StatusCode::CONFLICT);
        response.assert_json(
            &json!({"error": "Category is still used by transactions or recurring transactions"}),
        );
        client
            .get(&format_endpoint(endpoints::CATEGORY, id))
            .await
            .assert_status_ok();
    }
}
