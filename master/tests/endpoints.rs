use cache_common::{
    ClientFileInfo, Command, CommandType, HeartbeatRequest, NetAddress, RegisterRequest,
};
use cache_master::config::Config;
use cache_master::http;
use cache_master::service::MasterService;
use reqwest::{Client, StatusCode};

async fn spawn_master() -> String {
    let service = MasterService::new(Config {
        bind_address: "127.0.0.1:0".to_string(),
        ..Config::default()
    });
    let app = http::router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let base = spawn_master().await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn create_file_then_get_file_id_round_trips() {
    let base = spawn_master().await;
    let client = Client::new();

    let id: i32 = client
        .post(format!("{base}/user/createFile"))
        .json(&serde_json::json!({ "path": "/a/b.dat" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(id > 0);

    let fetched: i32 = client
        .get(format!("{base}/user/fileId?path=/a/b.dat"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, id);

    let response = client
        .post(format!("{base}/user/createFile"))
        .json(&serde_json::json!({ "path": "/a/b.dat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_file_id_lookup_is_not_found() {
    let base = spawn_master().await;
    let response = reqwest::get(format!("{base}/user/fileId?path=/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id: i32 = response.json().await.unwrap();
    assert_eq!(id, -1);

    let response = reqwest::get(format!("{base}/user/fileInfo/id/999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn worker_register_then_heartbeat_gets_command() {
    let base = spawn_master().await;
    let client = Client::new();

    let encoded: i64 = client
        .post(format!("{base}/worker/register"))
        .json(&RegisterRequest {
            address: NetAddress {
                host: "10.0.0.5".to_string(),
                port: 9000,
            },
            total_bytes: 1 << 30,
            used_bytes: 0,
            current_files: vec![],
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let worker_id = cache_common::EncodedWorkerId(encoded).worker_id();

    let command: Command = client
        .post(format!("{base}/worker/heartbeat"))
        .json(&HeartbeatRequest {
            worker_id,
            used_bytes: 0,
            removed_file_ids: vec![],
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(command.kind, CommandType::Nothing);

    let workers: Vec<cache_common::ClientWorkerInfo> = client
        .get(format!("{base}/workers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].address.host, "10.0.0.5");
}

#[tokio::test]
async fn unregistered_worker_heartbeat_returns_register_command() {
    let base = spawn_master().await;
    let client = Client::new();
    let command: Command = client
        .post(format!("{base}/worker/heartbeat"))
        .json(&HeartbeatRequest {
            worker_id: 4242,
            used_bytes: 0,
            removed_file_ids: vec![],
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(command.kind, CommandType::Register);
}

#[tokio::test]
async fn liststatus_reflects_children_after_mkdir() {
    let base = spawn_master().await;
    let client = Client::new();

    client
        .post(format!("{base}/user/mkdir"))
        .json(&serde_json::json!({ "path": "/dir" }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{base}/user/createFile"))
        .json(&serde_json::json!({ "path": "/dir/f1" }))
        .send()
        .await
        .unwrap();

    let listing: Vec<ClientFileInfo> = client
        .get(format!("{base}/liststatus/dir"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "f1");
    assert!(!listing[0].ready);
}

#[tokio::test]
async fn delete_recursive_removes_subtree() {
    let base = spawn_master().await;
    let client = Client::new();

    client
        .post(format!("{base}/user/mkdir"))
        .json(&serde_json::json!({ "path": "/gone" }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{base}/user/createFile"))
        .json(&serde_json::json!({ "path": "/gone/f" }))
        .send()
        .await
        .unwrap();

    let response = client
        .delete(format!("{base}/user/delete/path/gone?recursive=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .delete(format!("{base}/user/delete/path/gone?recursive=false"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
