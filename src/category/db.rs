//! Database operations for categories.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error, TransactionType, UserID,
    category::{Category, CategoryId, CategoryName},
};

const SELECT_CATEGORY: &str = "SELECT id, name, type, color, user_id FROM category";

/// Create a category for `user_id` and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if the user already has a category called `name`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    name: CategoryName,
    category_type: TransactionType,
    color: &str,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .execute(
            "INSERT INTO category (name, type, color, user_id) VALUES (?1, ?2, ?3, ?4);",
            (name.as_ref(), category_type, color, user_id),
        )
        .map_err(|error| map_unique_violation(error, &name))?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        name,
        category_type,
        color: color.to_owned(),
        user_id: user_id.clone(),
    })
}

/// Retrieve a single category by ID.
///
/// # Errors
/// Returns an [Error::NotFound] if the category does not exist or belongs to another user.
pub fn get_category(
    category_id: CategoryId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "{SELECT_CATEGORY} WHERE id = :id AND user_id = :user_id;"
        ))?
        .query_row(
            rusqlite::named_params! {":id": category_id, ":user_id": user_id},
            map_category_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve a category that another record is about to refer to.
///
/// # Errors
/// Returns an [Error::InvalidCategory] if the category does not exist or belongs to another
/// user.
pub fn require_category(
    category_id: CategoryId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    get_category(category_id, user_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidCategory(category_id),
        error => error,
    })
}

/// Retrieve all of a user's categories ordered alphabetically by name.
pub fn get_all_categories(user_id: &UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_CATEGORY} WHERE user_id = :user_id ORDER BY name ASC;"
        ))?
        .query_map(&[(":user_id", user_id)], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Find the category owned by `user_id` with `name` and `category_type`, if any.
pub fn find_category(
    name: &CategoryName,
    category_type: TransactionType,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Option<Category>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_CATEGORY} WHERE user_id = :user_id AND name = :name AND type = :type;"
        ))?
        .query_row(
            rusqlite::named_params! {
                ":user_id": user_id,
                ":name": name.as_ref(),
                ":type": category_type,
            },
            map_category_row,
        )
        .optional()
        .map_err(|error| error.into())
}

/// Get the category called `name`, creating it if the user does not have one yet.
///
/// # Errors
/// Returns an [Error::DuplicateCategoryName] if the user has a category called `name` of the
/// other transaction type.
pub fn get_or_create_category(
    name: &CategoryName,
    category_type: TransactionType,
    color: &str,
    user_id: &UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    match find_category(name, category_type, user_id, connection)? {
        Some(category) => Ok(category),
        None => {
            tracing::info!("Creating category \"{name}\" ({category_type}) for user {user_id}");
            create_category(name.clone(), category_type, color, user_id, connection)
        }
    }
}

/// Update a category's name, type and colour.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the category does not exist or belongs to another user,
/// - [Error::DuplicateCategoryName] if the new name is already taken,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_category(category: &Category, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE category SET name = ?1, type = ?2, color = ?3 WHERE id = ?4 AND user_id = ?5",
            (
                category.name.as_ref(),
                category.category_type,
                &category.color,
                category.id,
                &category.user_id,
            ),
        )
        .map_err(|error| map_unique_violation(error, &category.name))?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete a category by ID, along with its rules and budgets.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the category does not exist or belongs to another user,
/// - [Error::CategoryInUse] if transactions or recurring transactions still use the category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(
    category_id: CategoryId,
    user_id: &UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
            (category_id, user_id),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    // RESTRICT foreign keys are reported as trigger constraint failures.
                    extended_code:
                        rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER,
                },
                _,
            ) => Error::CategoryInUse,
            error => error.into(),
        })?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
            color TEXT NOT NULL,
            user_id TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(user_id, name)
        );

        CREATE INDEX IF NOT EXISTS idx_category_user_name ON category(user_id, name);",
    )?;

    Ok(())
}

fn map_unique_violation(error: rusqlite::Error, name: &CategoryName) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateCategoryName(name.to_string()),
        error => error.into(),
    }
}

/// Map a row selected with the columns id, name, type, color and user_id to a [Category].
pub(crate) fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    map_category_row_with_offset(row, 0)
}

/// Map a row to a [Category] where the category columns start at `offset`.
///
/// Useful for queries that join the category table onto another table.
pub(crate) fn map_category_row_with_offset(
    row: &Row,
    offset: usize,
) -> Result<Category, rusqlite::Error> {
    let id = row.get(offset)?;
    let raw_name: String = row.get(offset + 1)?;
    let category_type = row.get(offset + 2)?;
    let color = row.get(offset + 3)?;
    let raw_user_id: String = row.get(offset + 4)?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&raw_name),
        category_type,
        color,
        user_id: UserID::new(&raw_user_id),
    })
}
