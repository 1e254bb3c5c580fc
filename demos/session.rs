//! Demonstrates a gateway session against a mock backend: login, an expired token renewed
//! transparently, and a revoked refresh credential that ends the session.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::Value;
// self
use exam_gateway::{
	auth::Credentials,
	config::GatewayConfig,
	gateway::ReqwestGateway,
	http::RequestOptions,
	navigator::RecordingNavigator,
	store::{MemoryStore, TokenStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let store = MemoryStore::default();
	let navigator = RecordingNavigator::default();
	let config = GatewayConfig::builder(Url::parse(&server.url("/api/"))?).build()?;
	let gateway = ReqwestGateway::new(config, Arc::new(store.clone()) as Arc<dyn TokenStore>)?
		.with_navigator(Arc::new(navigator.clone()));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-stale\",\"user\":{\"id\":1,\"name\":\"Demo\"}}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/exams").header("authorization", "Bearer demo-stale");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/exams").header("authorization", "Bearer demo-fresh");
			then.status(200).header("content-type", "application/json").body("[{\"id\":1}]");
		})
		.await;

	let mut refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-fresh\"}");
		})
		.await;

	gateway.login(&Credentials::new("demo@example.com", "demo")).await?;

	let exams: Value = gateway.get("/exams", RequestOptions::default()).await?;

	println!("Exams after a transparent refresh: {exams}.");
	println!("Stored token: {:?}.", gateway.access_token().await?);

	refresh.delete_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401);
		})
		.await;
	store.set("access_token", "demo-stale".into()).await?;

	match gateway.get::<Value>("/exams", RequestOptions::default()).await {
		Ok(body) => println!("Unexpected success: {body}."),
		Err(e) => println!("Session ended: {e} (redirects: {:?}).", navigator.visits()),
	}

	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/logout");
			then.status(204);
		})
		.await;

	gateway.logout().await?;
	logout.assert_calls_async(1).await;

	println!("Authenticated after logout: {}.", gateway.is_authenticated().await?);

	Ok(())
}
