use cache_worker::config::Config;
use cache_worker::http;
use cache_worker::service::WorkerService;
use cache_worker::storage::WorkerStorage;
use reqwest::{Client, StatusCode};

async fn spawn_worker() -> (String, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let storage = WorkerStorage::new(
        64 * 1024,
        root.path().join("data"),
        root.path().join("tmp"),
        root.path().join("ufs-tmp"),
        root.path().join("ufs-data"),
    )
    .unwrap();

    let config = Config {
        bind_address: "127.0.0.1:0".to_string(),
        master_address: "http://127.0.0.1:1".to_string(),
        capacity_bytes: 64 * 1024,
        ..Config::default()
    };
    let service = WorkerService::new(config, storage);
    let app = http::router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), root)
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (base, _root) = spawn_worker().await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn data_folder_is_a_stable_path() {
    let (base, _root) = spawn_worker().await;
    let response = reqwest::get(format!("{base}/dataFolder")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let folder: String = response.json().await.unwrap();
    assert!(folder.ends_with("data"));
}

#[tokio::test]
async fn request_space_then_return_space_round_trips() {
    let (base, _root) = spawn_worker().await;
    let client = Client::new();

    let admitted: bool = client
        .post(format!("{base}/requestSpace"))
        .json(&serde_json::json!({ "user_id": 1, "bytes": 4096 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(admitted);

    let response = client
        .post(format!("{base}/returnSpace"))
        .json(&serde_json::json!({ "user_id": 1, "bytes": 4096 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_space_fails_once_capacity_is_exhausted() {
    let (base, _root) = spawn_worker().await;
    let client = Client::new();

    let first: bool = client
        .post(format!("{base}/requestSpace"))
        .json(&serde_json::json!({ "user_id": 1, "bytes": 60 * 1024 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first);

    let second: bool = client
        .post(format!("{base}/requestSpace"))
        .json(&serde_json::json!({ "user_id": 2, "bytes": 16 * 1024 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!second);
}

#[tokio::test]
async fn cache_file_promotes_temp_file_and_survives_unreachable_master() {
    let (base, root) = spawn_worker().await;
    let client = Client::new();

    client
        .post(format!("{base}/requestSpace"))
        .json(&serde_json::json!({ "user_id": 1, "bytes": 4096 }))
        .send()
        .await
        .unwrap();

    let temp_folder: String = client
        .get(format!("{base}/userTempFolder?user_id=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    std::fs::write(std::path::Path::new(&temp_folder).join("7"), vec![0u8; 4096]).unwrap();

    let response = client
        .post(format!("{base}/cacheFile"))
        .json(&serde_json::json!({ "user_id": 1, "file_id": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(root.path().join("data").join("7").exists());
}

#[tokio::test]
async fn add_checkpoint_fails_when_master_is_unreachable() {
    let (base, root) = spawn_worker().await;
    let client = Client::new();

    let underfs_temp: String = client
        .get(format!("{base}/userUnderfsTempFolder?user_id=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    std::fs::write(std::path::Path::new(&underfs_temp).join("9"), vec![0u8; 128]).unwrap();

    let response = client
        .post(format!("{base}/addCheckpoint"))
        .json(&serde_json::json!({ "user_id": 1, "file_id": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(root.path().join("ufs-data").join("9").exists());
}
