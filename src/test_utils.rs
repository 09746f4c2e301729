//! Helpers shared by the unit tests.

use axum_test::{TestRequest, TestServer};
use rusqlite::Connection;

use crate::{
    AppState, User, UserID,
    auth::{EMAIL_HEADER, NAME_HEADER, UID_HEADER},
    build_router,
    user::upsert_user,
};

const TEST_USER_ID: &str = "test-user";
const TEST_USER_EMAIL: &str = "test@example.com";
const TEST_USER_NAME: &str = "Test User";

const OTHER_USER_ID: &str = "other-user";
const OTHER_USER_EMAIL: &str = "other@example.com";
const OTHER_USER_NAME: &str = "Other User";

#[track_caller]
fn insert_user(id: &str, email: &str, name: &str, connection: &Connection) -> UserID {
    let user = User {
        id: UserID::new(id),
        email: email.to_owned(),
        name: name.to_owned(),
    };

    upsert_user(&user, connection).expect("Could not create test user");

    user.id
}

/// Add the test user to the database and return their ID.
#[track_caller]
pub fn create_test_user(connection: &Connection) -> UserID {
    insert_user(TEST_USER_ID, TEST_USER_EMAIL, TEST_USER_NAME, connection)
}

/// Add a second user to the database for checking that records are not shared between users.
#[track_caller]
pub fn other_test_user(connection: &Connection) -> UserID {
    insert_user(OTHER_USER_ID, OTHER_USER_EMAIL, OTHER_USER_NAME, connection)
}

/// A test server for the full router that sends the identity headers of the test user.
pub struct TestClient {
    pub server: TestServer,
    pub user_id: UserID,
    pub state: AppState,
}

impl TestClient {
    fn as_test_user(&self, request: TestRequest) -> TestRequest {
        request
            .add_header(UID_HEADER, TEST_USER_ID)
            .add_header(EMAIL_HEADER, TEST_USER_EMAIL)
            .add_header(NAME_HEADER, TEST_USER_NAME)
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.as_test_user(self.server.get(path))
    }

    pub fn post(&self, path: &str) -> TestRequest {
        self.as_test_user(self.server.post(path))
    }

    pub fn patch(&self, path: &str) -> TestRequest {
        self.as_test_user(self.server.patch(path))
    }

    pub fn delete(&self, path: &str) -> TestRequest {
        self.as_test_user(self.server.delete(path))
    }

    fn as_other_user(&self, request: TestRequest) -> TestRequest {
        request
            .add_header(UID_HEADER, OTHER_USER_ID)
            .add_header(EMAIL_HEADER, OTHER_USER_EMAIL)
            .add_header(NAME_HEADER, OTHER_USER_NAME)
    }

    /// Send a GET request as a different user to the test user.
    pub fn get_as_other_user(&self, path: &str) -> TestRequest {
        self.as_other_user(self.server.get(path))
    }

    /// Send a POST request as a different user to the test user.
    pub fn post_as_other_user(&self, path: &str) -> TestRequest {
        self.as_other_user(self.server.post(path))
    }
}

/// Create a test server backed by an in-memory database with the test user already added.
pub fn get_test_client() -> TestClient {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    let state = AppState::new(connection, "Etc/UTC").expect("Could not create app state.");

    let user_id = {
        let connection = state.db_connection.lock().unwrap();
        create_test_user(&connection)
    };

    let server =
        TestServer::new(build_router(state.clone())).expect("Could not create test server.");

    TestClient {
        server,
        user_id,
        state,
    }
}
