// std
use std::time::Duration as StdDuration;
// crates.io
use axum::{
	Router,
	body::{Body, to_bytes},
	http::{Request, StatusCode, header},
	response::Response,
};
use httpmock::prelude::*;
use serde_json::json;
use tokio::{net::TcpListener, sync::oneshot};
use tower::ServiceExt;
// self
use github_token_exchange::{
	_preludet::*,
	config::{InboundMode, ServerConfig},
	error::ConfigError,
	server,
};

const ROUTE: &str = "/authenticate/github";

fn json_router(base_url: &str) -> Router {
	build_test_router(
		build_test_exchanger(test_exchange_config(base_url)),
		&ServerConfig::default(),
	)
}

async fn body_string(response: Response) -> String {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.");

	String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8.")
}

fn post_json(body: &'static str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(ROUTE)
		.header(header::CONTENT_TYPE, "application/json")
		.header(header::ORIGIN, "https://app.example.com")
		.body(Body::from(body))
		.expect("Request should build.")
}

#[tokio::test]
async fn json_route_returns_client_result() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "access_token": "gho_ada", "token_type": "bearer" }));
		})
		.await;
	let _profile = server
		.mock_async(|when, then| {
			when.method(GET).path(PROFILE_PATH);
			then.status(200).json_body(json!({ "name": "Ada", "email": "ada@example.com" }));
		})
		.await;
	let response = json_router(&server.base_url())
		.oneshot(post_json(r#"{"code":"good"}"#))
		.await
		.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
		Some("application/json")
	);
	assert_eq!(
		response
			.headers()
			.get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
			.and_then(|v| v.to_str().ok()),
		Some("*")
	);
	assert_eq!(
		body_string(response).await,
		r#"{"user_name":"Ada","user_email":"ada@example.com","token":"gho_ada"}"#
	);
}

#[tokio::test]
async fn upstream_rejection_is_forwarded_byte_for_byte() {
	let server = MockServer::start_async().await;
	let upstream_body = r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired.","error_uri":"https://docs.github.com"}"#;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400).header("content-type", "application/json").body(upstream_body);
		})
		.await;
	let response = json_router(&server.base_url())
		.oneshot(post_json(r#"{"code":"stale"}"#))
		.await
		.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(body_string(response).await, upstream_body);
}

#[tokio::test]
async fn json_route_rejects_bad_input_without_upstream_calls() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "access_token": "unused" }));
		})
		.await;
	let router = json_router(&server.base_url());
	let cases = [
		(
			Request::builder()
				.method("POST")
				.uri(ROUTE)
				.header(header::CONTENT_TYPE, "text/plain")
				.body(Body::from(r#"{"code":"c"}"#))
				.expect("Request should build."),
			StatusCode::UNSUPPORTED_MEDIA_TYPE,
			None,
		),
		(post_json(""), StatusCode::BAD_REQUEST, Some(r#"{"error":"empty body"}"#)),
		(post_json("{\"code\":"), StatusCode::BAD_REQUEST, None),
		(post_json(r#"{"client_id":"x"}"#), StatusCode::BAD_REQUEST, Some(r#"{"error":"missing code"}"#)),
	];

	for (request, status, body) in cases {
		let response = router.clone().oneshot(request).await.expect("Router should respond.");

		assert_eq!(response.status(), status);

		if let Some(expected) = body {
			assert_eq!(body_string(response).await, expected);
		}
	}

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn query_route_accepts_get_parameters() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).json_body(json!({
				"client_id": "from-query",
				"client_secret": TEST_CLIENT_SECRET,
				"code": "q-code",
			}));
			then.status(200).json_body(json!({ "access_token": "gho_q" }));
		})
		.await;
	let server_config = ServerConfig {
		path: "/".into(),
		inbound: InboundMode::Query,
		..ServerConfig::default()
	};
	let router = build_test_router(
		build_test_exchanger(test_exchange_config(&server.base_url()).with_enrich_profile(false)),
		&server_config,
	);
	let response = router
		.clone()
		.oneshot(
			Request::builder()
				.method("GET")
				.uri("/?client_id=from-query&code=q-code&client_secret=ignored")
				.body(Body::empty())
				.expect("Request should build."),
		)
		.await
		.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_string(response).await, r#"{"token":"gho_q"}"#);

	let response = router
		.oneshot(Request::builder().method("GET").uri("/").body(Body::empty()).expect("Builds."))
		.await
		.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	token.assert_async().await;
}

#[tokio::test]
async fn health_route_answers_ok() {
	let response = json_router("http://127.0.0.1:9")
		.oneshot(Request::builder().uri("/healthz").body(Body::empty()).expect("Builds."))
		.await
		.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn served_listener_handles_requests_until_shutdown() {
	let upstream = MockServer::start_async().await;
	let _token = upstream
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "access_token": "gho_live" }));
		})
		.await;
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Ephemeral port should bind.");
	let addr = listener.local_addr().expect("Listener should have an address.");
	let exchanger =
		build_test_exchanger(test_exchange_config(&upstream.base_url()).with_enrich_profile(false));
	let (stop, stopped) = oneshot::channel::<()>();
	let handle = tokio::spawn(async move {
		server::serve_on(listener, exchanger, &ServerConfig::default(), async {
			let _ = stopped.await;
		})
		.await
	});
	let response = reqwest::Client::new()
		.post(format!("http://{addr}{ROUTE}"))
		.header("content-type", "application/json")
		.body(r#"{"code":"live"}"#)
		.send()
		.await
		.expect("Server should answer.");

	assert_eq!(response.status().as_u16(), 200);
	assert_eq!(response.text().await.expect("Body should be readable."), r#"{"token":"gho_live"}"#);

	stop.send(()).expect("Server should still be running.");

	tokio::time::timeout(StdDuration::from_secs(5), handle)
		.await
		.expect("Server should stop after shutdown.")
		.expect("Server task should not panic.")
		.expect("Server should exit cleanly.");
}

#[tokio::test]
async fn missing_secret_refuses_to_bind() {
	let port = {
		let listener =
			std::net::TcpListener::bind("127.0.0.1:0").expect("Ephemeral port should bind.");

		listener.local_addr().expect("Listener should have an address.").port()
	};
	let listen = format!("127.0.0.1:{port}");
	let vars = [("GITHUB_CLIENT_ID", "cid"), ("EXCHANGE_LISTEN", listen.as_str())]
		.into_iter()
		.map(|(k, v)| (k.to_owned(), v.to_owned()))
		.collect();
	let err = tokio::time::timeout(
		StdDuration::from_secs(5),
		server::run(vars, std::future::pending::<()>()),
	)
	.await
	.expect("Startup must fail fast instead of serving.")
	.expect_err("Startup must fail without a client secret.");

	assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::MissingClientSecret)));
	assert!(
		std::net::TcpListener::bind(&listen).is_ok(),
		"The configured address must still be free."
	);
}
