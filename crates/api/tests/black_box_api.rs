use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use spacedock_auth::{Hs256JwtAuthenticator, JwtClaims};
use spacedock_core::{AccountId, ContainerId};
use spacedock_infra::{BlueprintCatalog, HttpBlueprintCatalog, Services, StaticBlueprintCatalog};

const JWT_SECRET: &str = "test-secret";

/// Reference blueprints plus a structure with hangar space.
const TEST_CATALOG: &str = r#"{
  "factory": {
    "type": "structure", "volume": 100, "inventory_capacity": 500,
    "build": { "time": 300, "resources": { "metal": 2 } },
    "canRefine": ["ore"]
  },
  "drydock": { "type": "structure", "volume": 100, "inventory_capacity": 100, "hanger_capacity": 200 },
  "ore": { "type": "resource", "volume": 1, "refine": { "time": 5, "outputs": { "metal": 1, "rock": 2 } } },
  "metal": { "type": "resource", "volume": 1 },
  "rock": { "type": "resource", "volume": 1 },
  "starterShip": {
    "type": "spaceship", "volume": 50, "inventory_capacity": 100, "hanger_capacity": 0,
    "canRefine": ["ore"]
  }
}"#;

struct TestServer {
    base_url: String,
    services: Services,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let catalog = StaticBlueprintCatalog::from_json(TEST_CATALOG).expect("test catalog");
        Self::spawn_with(Arc::new(catalog)).await
    }

    async fn spawn_with(catalog: Arc<dyn BlueprintCatalog>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = Services::in_memory(catalog, Duration::from_millis(500));
        let app = spacedock_api::app::build_app(
            services.clone(),
            Arc::new(Hs256JwtAuthenticator::new(JWT_SECRET)),
            Duration::from_millis(500),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(account: AccountId, privileged: bool) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: account,
        privileged,
        issued_at: now - ChronoDuration::seconds(1),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// A player plus a privileged credential acting for the same account.
struct Player {
    account: AccountId,
    token: String,
    service_token: String,
}

impl Player {
    fn new() -> Self {
        let account = AccountId::new();
        Self {
            account,
            token: mint_jwt(account, false),
            service_token: mint_jwt(account, true),
        }
    }
}

async fn create_container(
    client: &reqwest::Client,
    srv: &TestServer,
    owner: &Player,
    blueprint: &str,
) -> ContainerId {
    let id = ContainerId::new();
    let res = client
        .post(srv.url(&format!("/containers/{id}")))
        .bearer_auth(&owner.service_token)
        .json(&json!({ "account": owner.account, "blueprint": blueprint }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    id
}

async fn grant(client: &reqwest::Client, srv: &TestServer, owner: &Player, at: ContainerId, slice: &str, blueprint: &str, n: i64) {
    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&owner.service_token)
        .json(&json!([{
            "type": "transfer", "inventory": at, "slice": slice, "quantity": n, "blueprint": blueprint
        }]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

async fn get_json(client: &reqwest::Client, srv: &TestServer, token: &str, path: &str) -> Value {
    let res = client
        .get(srv.url(path))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "GET {path}");
    res.json().await.unwrap()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = client
        .get(srv.url("/inventory"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn caller_identity_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let player = Player::new();

    let body = get_json(&client, &srv, &player.service_token, "/whoami").await;
    assert_eq!(body["account"].as_str().unwrap(), player.account.to_string());
    assert_eq!(body["privileged"], true);

    let body = get_json(&client, &srv, &player.token, "/whoami").await;
    assert_eq!(body["privileged"], false);
}

#[tokio::test]
async fn balanced_transfers_move_cargo_between_containers() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let player = Player::new();

    let a = create_container(&client, &srv, &player, "factory").await;
    let b = create_container(&client, &srv, &player, "factory").await;
    grant(&client, &srv, &player, a, "default", "ore", 3).await;

    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&player.token)
        .json(&json!([
            { "type": "transfer", "inventory": a, "quantity": -2, "blueprint": "ore" },
            { "type": "transfer", "inventory": b, "quantity": 2, "blueprint": "ore" }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let body = get_json(&client, &srv, &player.token, &format!("/inventory/{a}")).await;
    assert_eq!(body["cargo"]["default"]["ore"], 1);
    assert_eq!(body["usage"]["cargo"], 1);
    let body = get_json(&client, &srv, &player.token, &format!("/inventory/{b}")).await;
    assert_eq!(body["cargo"]["default"]["ore"], 2);

    // Unprivileged callers cannot mint goods.
    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&player.token)
        .json(&json!([{ "type": "transfer", "inventory": a, "quantity": 5, "blueprint": "ore" }]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unbalanced");

    let listed = get_json(&client, &srv, &player.token, "/inventory").await;
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn ownership_is_enforced() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = Player::new();
    let stranger = Player::new();

    let a = create_container(&client, &srv, &owner, "factory").await;
    let b = create_container(&client, &srv, &stranger, "factory").await;
    grant(&client, &srv, &owner, a, "default", "ore", 3).await;

    let res = client
        .get(srv.url(&format!("/inventory/{a}")))
        .bearer_auth(&stranger.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Taking from someone else's container fails and changes nothing.
    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&stranger.token)
        .json(&json!([
            { "type": "transfer", "inventory": a, "quantity": -1, "blueprint": "ore" },
            { "type": "transfer", "inventory": b, "quantity": 1, "blueprint": "ore" }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = get_json(&client, &srv, &owner.token, &format!("/inventory/{a}")).await;
    assert_eq!(body["cargo"]["default"]["ore"], 3);

    let res = client
        .get(srv.url("/inventory?all=true"))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let all = get_json(&client, &srv, &owner.service_token, "/inventory?all=true").await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let res = client
        .delete(srv.url(&format!("/containers/{b}")))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refine_job_round_trip() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let player = Player::new();

    let store = create_container(&client, &srv, &player, "factory").await;
    grant(&client, &srv, &player, store, "default", "ore", 3).await;

    let res = client
        .post(srv.url("/facilities"))
        .bearer_auth(&player.token)
        .json(&json!({ "blueprint": "factory" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let facility: Value = res.json().await.unwrap();

    let res = client
        .post(srv.url("/jobs"))
        .bearer_auth(&player.token)
        .json(&json!({
            "facility": facility["id"],
            "action": "refine",
            "target": "ore",
            "quantity": 3,
            "inventory": store
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let job: Value = res.json().await.unwrap();
    let job_id = job["id"].as_str().unwrap().to_string();
    assert_eq!(job["finished"], false);

    let body = get_json(&client, &srv, &player.token, &format!("/inventory/{store}")).await;
    assert!(body["cargo"]["default"].get("ore").is_none());

    let res = client
        .delete(srv.url(&format!("/jobs/{job_id}")))
        .bearer_auth(&player.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("job cancellation is not supported"));

    let report = srv
        .services
        .jobs
        .tick(Utc::now() + ChronoDuration::minutes(1))
        .await
        .unwrap();
    assert_eq!(report.completed.len(), 1);

    let body = get_json(&client, &srv, &player.token, &format!("/jobs/{job_id}")).await;
    assert_eq!(body["finished"], true);
    let body = get_json(&client, &srv, &player.token, &format!("/inventory/{store}")).await;
    assert_eq!(body["cargo"]["default"]["metal"], 3);
    assert_eq!(body["cargo"]["default"]["rock"], 6);
}

#[tokio::test]
async fn ships_unpack_undock_and_dock() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let player = Player::new();

    let dock = create_container(&client, &srv, &player, "drydock").await;
    grant(&client, &srv, &player, dock, "bay1", "starterShip", 2).await;

    let res = client
        .post(srv.url("/ships"))
        .bearer_auth(&player.token)
        .json(&json!({ "container": dock, "slice": "bay1", "blueprint": "starterShip" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let ship: Value = res.json().await.unwrap();
    let ship_id = ship["id"].as_str().unwrap().to_string();
    assert_eq!(ship["state"]["status"], "docked");

    let hangar = get_json(&client, &srv, &player.token, &format!("/inventory/{dock}")).await;
    assert_eq!(hangar["hangar"]["bay1"]["packed"]["starterShip"], 1);
    assert_eq!(hangar["hangar"]["bay1"]["unpacked"][0], ship_id.as_str());
    let companion = get_json(&client, &srv, &player.token, &format!("/inventory/{ship_id}")).await;
    assert_eq!(companion["usage"]["cargo"], 0);

    let res = client
        .post(srv.url(&format!("/ships/{ship_id}")))
        .bearer_auth(&player.token)
        .json(&json!({ "in_space": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ship: Value = res.json().await.unwrap();
    assert_eq!(ship["state"]["status"], "in_space");

    let res = client
        .post(srv.url(&format!("/ships/{ship_id}")))
        .bearer_auth(&player.token)
        .json(&json!({ "in_space": false, "container": dock, "slice": "bay1", "name": "Rocinante" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ship: Value = res.json().await.unwrap();
    assert_eq!(ship["state"]["status"], "docked");
    assert_eq!(ship["customization"]["name"], "Rocinante");

    let after = get_json(&client, &srv, &player.token, &format!("/inventory/{dock}")).await;
    assert_eq!(after["hangar"], hangar["hangar"]);
    assert_eq!(after["usage"], hangar["usage"]);

    // Location cannot be patched directly.
    let res = client
        .post(srv.url(&format!("/ships/{ship_id}")))
        .bearer_auth(&player.token)
        .json(&json!({ "slice": "bay2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let listed = get_json(&client, &srv, &player.token, "/ships").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_ship_patch_does_not_move_the_ship() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let player = Player::new();

    let dock = create_container(&client, &srv, &player, "drydock").await;
    grant(&client, &srv, &player, dock, "bay1", "starterShip", 1).await;
    let res = client
        .post(srv.url("/ships"))
        .bearer_auth(&player.token)
        .json(&json!({ "container": dock, "slice": "bay1", "blueprint": "starterShip" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let ship: Value = res.json().await.unwrap();
    let ship_id = ship["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url(&format!("/ships/{ship_id}")))
        .bearer_auth(&player.token)
        .json(&json!({ "in_space": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let hangar = get_json(&client, &srv, &player.token, &format!("/inventory/{dock}")).await;

    let res = client
        .post(srv.url(&format!("/ships/{ship_id}")))
        .bearer_auth(&player.token)
        .json(&json!({ "in_space": false, "container": dock, "slice": "bay1", "blueprint": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let ship = get_json(&client, &srv, &player.token, &format!("/ships/{ship_id}")).await;
    assert_eq!(ship["state"]["status"], "in_space");
    assert_eq!(ship["blueprint"], "starterShip");
    let after = get_json(&client, &srv, &player.token, &format!("/inventory/{dock}")).await;
    assert_eq!(after["hangar"], hangar["hangar"]);
}

#[tokio::test]
async fn unreachable_catalog_is_a_service_error() {
    // Nothing listens on port 1.
    let catalog = HttpBlueprintCatalog::new("http://127.0.0.1:1");
    let srv = TestServer::spawn_with(Arc::new(catalog)).await;
    let client = reqwest::Client::new();
    let player = Player::new();

    let res = client
        .post(srv.url("/inventory"))
        .bearer_auth(&player.token)
        .json(&json!([
            { "type": "transfer", "inventory": ContainerId::new(), "quantity": -1, "blueprint": "ore" }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "dependency_failure");
}
