// handler/reviews.rs
use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::reviewdtos::{
        ApiResponse, CreateReviewDto, FilterReviewDto, JssResponseDto, ReplyReviewDto,
        ReviewListResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddeware,
    service::review_validator::ReviewValidator,
    AppState,
};

pub fn reviews_handler() -> Router {
    Router::new()
        .route("/", post(create_review))
        .route("/:review_id", get(get_review))
        .route("/:review_id/reply", post(reply_to_review))
        .route("/reviewee/:user_id", get(get_reviews_for_reviewee))
        .route("/clients/:client_id/reputation", get(get_client_reputation))
        .route("/freelancers/:user_id/jss", get(get_freelancer_jss))
}

pub async fn create_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    // Reviews are always written in the caller's own name.
    if body.reviewer_id.trim() != auth.user_id {
        return Err(HttpError::forbidden(ErrorMessage::ReviewerMismatch.to_string()));
    }

    let new_review = ReviewValidator::validate_submission(body)?;
    let review = app_state.review_service.submit_review(new_review).await?;

    let message = if review.is_released() {
        "Review submitted and released"
    } else {
        "Review submitted and pending the other party's review"
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            message,
            FilterReviewDto::filter_review(&review, &auth.user_id),
        )),
    ))
}

pub async fn get_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(review_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let review = app_state
        .review_service
        .get_review(review_id, &auth.user_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Review retrieved successfully",
        FilterReviewDto::filter_review(&review, &auth.user_id),
    )))
}

pub async fn reply_to_review(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(review_id): Path<Uuid>,
    Json(body): Json<ReplyReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review = app_state
        .reply_service
        .reply_to_review(review_id, &auth.user_id, body)
        .await?;

    Ok(Json(ApiResponse::success(
        "Reply added successfully",
        FilterReviewDto::filter_review(&review, &auth.user_id),
    )))
}

pub async fn get_reviews_for_reviewee(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let reviews = app_state.review_service.list_released_reviews(&user_id).await?;
    let reviews = FilterReviewDto::filter_reviews(&reviews, &auth.user_id);

    Ok(Json(ApiResponse::success(
        "Reviews retrieved successfully",
        ReviewListResponseDto {
            results: reviews.len(),
            reviews,
        },
    )))
}

pub async fn get_client_reputation(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state
        .reputation_service
        .get_client_reputation(&client_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Client reputation retrieved successfully",
        snapshot,
    )))
}

pub async fn get_freelancer_jss(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let jss = app_state.jss_service.calculate_jss(&user_id).await?;

    Ok(Json(ApiResponse::success(
        "Job success score calculated successfully",
        JssResponseDto { user_id, jss },
    )))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{
        routes::create_router,
        testing::{test_app_state, TEST_JWT_SECRET},
        utils::token::create_token,
    };

    fn bearer(user_id: &str) -> String {
        format!("Bearer {}", create_token(user_id, TEST_JWT_SECRET.as_bytes(), 3600).unwrap())
    }

    fn review_body(reviewer: &str, reviewee: &str, contract: &str, overall: i32) -> Value {
        json!({
            "reviewer_id": reviewer,
            "reviewee_id": reviewee,
            "job_id": "job-1",
            "contract_id": contract,
            "rating_overall": overall,
            "rating_communication": overall,
            "rating_quality": overall,
            "rating_value": overall,
            "rating_schedule": overall,
            "private_rating": 8,
            "comment": "Solid collaboration",
            "contract_value": "2500.00"
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, caller: Option<&str>, body: Option<Value>) -> (u16, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            request = request.header(header::AUTHORIZATION, bearer(caller));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let app = create_router(test_app_state());

        let (status, body) = send(&app, Method::GET, "/api/reviews/reviewee/client-1", None, None).await;

        assert_eq!(status, 401);
        assert_eq!(body["status"], "fail");
    }

    #[tokio::test]
    async fn healthchecker_is_public() {
        let app = create_router(test_app_state());

        let (status, body) = send(&app, Method::GET, "/api/healthchecker", None, None).await;

        assert_eq!(status, 200);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn double_blind_flow_over_http() {
        let app = create_router(test_app_state());

        let (status, first) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some("freelancer-1"),
            Some(review_body("freelancer-1", "client-1", "contract-123", 5)),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(first["data"]["status"], "PENDING");
        assert_eq!(first["data"]["private_rating"], 8);
        let first_id = first["data"]["id"].as_str().unwrap().to_string();

        // Hidden from the other party until they submit.
        let (status, _) = send(&app, Method::GET, &format!("/api/reviews/{}", first_id), Some("client-1"), None).await;
        assert_eq!(status, 404);

        let (status, reply) = send(
            &app,
            Method::POST,
            &format!("/api/reviews/{}/reply", first_id),
            Some("client-1"),
            Some(json!({"reply": "Thanks!"})),
        )
        .await;
        assert_eq!(status, 409, "{}", reply);

        let (status, second) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some("client-1"),
            Some(review_body("client-1", "freelancer-1", "contract-123", 4)),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(second["data"]["status"], "RELEASED");

        let (status, seen) = send(&app, Method::GET, &format!("/api/reviews/{}", first_id), Some("client-1"), None).await;
        assert_eq!(status, 200);
        assert_eq!(seen["data"]["status"], "RELEASED");
        assert_eq!(seen["data"]["revealed_at"], second["data"]["revealed_at"]);
        assert!(seen["data"].get("private_rating").is_none());

        let (status, replied) = send(
            &app,
            Method::POST,
            &format!("/api/reviews/{}/reply", first_id),
            Some("client-1"),
            Some(json!({"reply": "Thanks!"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(replied["data"]["reply"], "Thanks!");

        let (status, listed) = send(&app, Method::GET, "/api/reviews/reviewee/client-1", Some("anyone"), None).await;
        assert_eq!(status, 200);
        assert_eq!(listed["data"]["results"], 1);
    }

    #[tokio::test]
    async fn cannot_review_on_behalf_of_someone_else() {
        let app = create_router(test_app_state());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some("intruder"),
            Some(review_body("freelancer-1", "client-1", "contract-1", 5)),
        )
        .await;

        assert_eq!(status, 403);
    }

    #[tokio::test]
    async fn invalid_submission_lists_fields() {
        let app = create_router(test_app_state());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some("freelancer-1"),
            Some(review_body("freelancer-1", "client-1", "contract-1", 7)),
        )
        .await;

        assert_eq!(status, 400);
        assert!(body["message"].as_str().unwrap().contains("rating_overall"));
    }

    #[tokio::test]
    async fn duplicate_submission_conflicts() {
        let app = create_router(test_app_state());
        let body = review_body("freelancer-1", "client-1", "contract-1", 5);

        let (status, _) = send(&app, Method::POST, "/api/reviews", Some("freelancer-1"), Some(body.clone())).await;
        assert_eq!(status, 201);

        let (status, _) = send(&app, Method::POST, "/api/reviews", Some("freelancer-1"), Some(body)).await;
        assert_eq!(status, 409);
    }

    #[tokio::test]
    async fn reputation_and_jss_endpoints() {
        let app = create_router(test_app_state());

        let (status, reputation) = send(&app, Method::GET, "/api/reviews/clients/client-1/reputation", Some("viewer"), None).await;
        assert_eq!(status, 200);
        assert_eq!(reputation["data"]["spend_tier"], "NONE");
        assert_eq!(reputation["data"]["degraded"], true);

        let (status, jss) = send(&app, Method::GET, "/api/reviews/freelancers/freelancer-1/jss", Some("viewer"), None).await;
        assert_eq!(status, 200);
        assert_eq!(jss["data"]["jss"], 100);
    }
}
