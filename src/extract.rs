//! Extractors that report malformed requests as JSON errors.
//!
//! These wrap the axum extractors of the same purpose and convert their rejections into
//! [Error::InvalidRequest](crate::Error::InvalidRequest) so that every response from the API,
//! including parse failures, has the body `{"error": "..."}`.

use axum::extract::{FromRequest, FromRequestParts, Path, Query};

use crate::Error;

/// A JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct JsonBody<T>(pub T);

/// The query string of a request.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(Error))]
pub struct QueryParams<T>(pub T);

/// A path parameter, e.g. the ID in `/api/categories/{category_id}`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(Error))]
pub struct PathParam<T>(pub T);

#[cfg(test)]
mod tests {
    use axum::{Json, Router, routing::post};
    use axum_test::TestServer;
    use serde::Deserialize;
    use serde_json::{Value, json};

    use crate::extract::{JsonBody, PathParam};

    #[derive(Deserialize)]
    struct Payload {
        name: String,
    }

    async fn echo(
        PathParam(id): PathParam<i64>,
        JsonBody(payload): JsonBody<Payload>,
    ) -> Json<Value> {
        Json(json!({"id": id, "name": payload.name}))
    }

    fn get_test_server() -> TestServer {
        let app = Router::new().route("/echo/{id}", post(echo));

        TestServer::new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn valid_request_is_extracted() {
        let server = get_test_server();

        let response = server.post("/echo/3").json(&json!({"name": "foo"})).await;

        response.assert_status_ok();
        response.assert_json(&json!({"id": 3, "name": "foo"}));
    }

    #[tokio::test]
    async fn malformed_json_is_json_bad_request() {
        let server = get_test_server();

        let response = server
            .post("/echo/3")
            .bytes("{not json".into())
            .content_type("application/json")
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn invalid_path_parameter_is_json_bad_request() {
        let server = get_test_server();

        let response = server.post("/echo/abc").json(&json!({"name": "foo"})).await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert!(body["error"].is_string());
    }
}
