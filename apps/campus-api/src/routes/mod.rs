//! # REST Routes
//!
//! One module per resource. Each exposes `router()` which is merged into
//! the `/api` tree here.
//!
//! | Prefix            | Module            |
//! |-------------------|-------------------|
//! | `/students`       | [`students`]      |
//! | `/teachers`       | [`teachers`]      |
//! | `/classes`        | [`classes`]       |
//! | `/subjects` `/rooms` `/periods` | [`catalog`] |
//! | `/timetable`      | [`timetable`]     |
//! | `/fees`           | [`fees`]          |
//! | `/invoices`       | [`invoices`]      |
//! | `/payments`       | [`payments`]      |
//! | `/attendance`     | [`attendance`]    |
//! | `/exams`          | [`exams`]         |
//! | `/notifications`  | [`notifications`] |

pub mod attendance;
pub mod catalog;
pub mod classes;
pub mod exams;
pub mod fees;
pub mod invoices;
pub mod notifications;
pub mod payments;
pub mod students;
pub mod teachers;
pub mod timetable;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(students::router())
        .merge(teachers::router())
        .merge(classes::router())
        .merge(catalog::router())
        .merge(timetable::router())
        .merge(fees::router())
        .merge(invoices::router())
        .merge(payments::router())
        .merge(attendance::router())
        .merge(exams::router())
        .merge(notifications::router())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: bool,
    version: &'static str,
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.db.health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        warn!("Health check failed: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database { "ok" } else { "degraded" },
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::util::ServiceExt; // for `oneshot`

    use campus_db::{Database, DbConfig};

    use crate::{create_router, AppState};

    async fn setup_test_app() -> Router {
        let db = Database::new(DbConfig::in_memory())
            .await
            .expect("Failed to create test database");
        create_router(AppState::new(db))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router, uri: &str, body: Value) -> Value {
        let (status, json) = send(app, Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {} failed: {}", uri, json);
        json
    }

    /// Grade 4 with one student and a 10,000 monthly tuition fee.
    async fn billed_student(app: &Router) -> (String, String) {
        let class = create(app, "/api/classes", json!({ "name": "Grade 4", "academicYear": "2025" })).await;
        let class_id = class["id"].as_str().unwrap().to_string();

        create(
            app,
            "/api/fees/structures",
            json!({
                "classId": class_id,
                "name": "Tuition",
                "amountCents": 1_000_000,
                "frequency": "monthly",
                "academicYear": "2025"
            }),
        )
        .await;

        let student = create(
            app,
            "/api/students",
            json!({ "firstName": "Amina", "lastName": "Hassan", "classId": class_id }),
        )
        .await;
        (class_id, student["id"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_health() {
        let app = setup_test_app().await;
        let (status, json) = send(&app, Method::GET, "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
    }

    #[tokio::test]
    async fn test_unknown_student_is_404() {
        let app = setup_test_app().await;
        let (status, json) = send(&app, Method::GET, "/api/students/nobody", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json["message"].as_str().unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_blank_name_is_400() {
        let app = setup_test_app().await;
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/students",
            Some(json!({ "firstName": "  ", "lastName": "Hassan" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invoice_and_payment_flow() {
        let app = setup_test_app().await;
        let (_, student_id) = billed_student(&app).await;

        let invoice = create(
            &app,
            "/api/invoices",
            json!({ "studentId": student_id, "billingMonth": "2025-03" }),
        )
        .await;
        assert_eq!(invoice["netCents"], 1_000_000);
        assert_eq!(invoice["status"], "pending");
        assert_eq!(invoice["items"].as_array().unwrap().len(), 1);
        let invoice_id = invoice["id"].as_str().unwrap().to_string();

        let (status, json) = send(
            &app,
            Method::POST,
            "/api/invoices",
            Some(json!({ "studentId": student_id, "billingMonth": "2025-03" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "CONFLICT");

        let receipt = create(
            &app,
            "/api/payments",
            json!({ "invoiceId": invoice_id, "amountCents": 1_000_000, "method": "cash" }),
        )
        .await;
        assert_eq!(receipt["invoice"]["status"], "paid");
        assert_eq!(receipt["invoice"]["balanceCents"], 0);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/payments",
            Some(json!({ "invoiceId": invoice_id, "amountCents": 100, "method": "cash" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, payments) =
            send(&app, Method::GET, &format!("/api/invoices/{}/payments", invoice_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payments.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_billing_month_is_400() {
        let app = setup_test_app().await;
        let (_, student_id) = billed_student(&app).await;

        let (status, json) = send(
            &app,
            Method::POST,
            "/api/invoices",
            Some(json!({ "studentId": student_id, "billingMonth": "2025-13" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_double_booking_is_409() {
        let app = setup_test_app().await;
        let class = create(&app, "/api/classes", json!({ "name": "Grade 5", "academicYear": "2025" })).await;
        let maths = create(&app, "/api/subjects", json!({ "code": "MATH", "name": "Mathematics" })).await;
        let english = create(&app, "/api/subjects", json!({ "code": "ENG", "name": "English" })).await;
        let period = create(
            &app,
            "/api/periods",
            json!({ "name": "Period 1", "startTime": "08:00", "endTime": "08:40", "sortOrder": 1 }),
        )
        .await;
        let mut teachers = Vec::new();
        for (first, email) in [("Mark", "mark@campus.test"), ("Grace", "grace@campus.test")] {
            teachers.push(
                create(
                    &app,
                    "/api/teachers",
                    json!({ "firstName": first, "lastName": "Otieno", "email": email }),
                )
                .await,
            );
        }

        let booking = |subject: &Value, teacher: &Value| {
            json!({
                "classId": class["id"],
                "subjectId": subject["id"],
                "teacherId": teacher["id"],
                "periodId": period["id"],
                "dayOfWeek": 1,
                "academicYear": "2025"
            })
        };

        create(&app, "/api/timetable", booking(&maths, &teachers[0])).await;

        let (status, json) =
            send(&app, Method::POST, "/api/timetable", Some(booking(&english, &teachers[1]))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["message"], "Class is already booked for this period");

        let uri = format!("/api/classes/{}/timetable?year=2025", class["id"].as_str().unwrap());
        let (status, entries) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_overdue_body_is_optional() {
        let app = setup_test_app().await;
        let (_, student_id) = billed_student(&app).await;
        create(
            &app,
            "/api/invoices",
            json!({ "studentId": student_id, "billingMonth": "2025-03" }),
        )
        .await;

        let (status, json) = send(&app, Method::POST, "/api/invoices/mark-overdue", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["asOf"].is_string());

        let (status, json) = send(
            &app,
            Method::POST,
            "/api/invoices/mark-overdue",
            Some(json!({ "asOf": "2025-03-05" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["asOf"], "2025-03-05");
        assert_eq!(json["updated"], 0);
    }
}
