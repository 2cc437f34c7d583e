use std::sync::Arc;

use coordinator_api::create_app;
use coordinator_core::config::ApiConfig;
use coordinator_dispatcher::CoordinatorController;
use coordinator_testing_utils::{ManualClock, MockStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub mocks: MockStore,
    pub clock: ManualClock,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> TestApp {
        let mocks = MockStore::new();
        let clock = ManualClock::starting_now();
        let controller = Arc::new(CoordinatorController::new(
            mocks.store(),
            Arc::new(clock.clone()),
            None,
            None,
        ));

        // 不安装全局recorder，避免测试之间互相干扰
        let metrics = PrometheusBuilder::new().build_recorder().handle();
        let app = create_app(controller, Some(metrics), &ApiConfig::default(), "/metrics");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let address = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            address,
            mocks,
            clock,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn heartbeat(&self, network_id: &str, hostname: &str) -> Value {
        let response = self
            .post_json(
                "/api/heartbeat",
                json!({ "networkId": network_id, "hostname": hostname }),
            )
            .await;
        assert_eq!(response.status(), 200);
        response.json::<Value>().await.unwrap()["data"].clone()
    }

    /// 创建批次并返回 (批次ID, 作业ID列表)
    pub async fn create_study(&self, name: &str, count: usize) -> (String, Vec<String>) {
        let assignments: Vec<Value> = (0..count).map(|i| json!({ "pitch": i })).collect();
        let response = self
            .post_json(
                "/api/super-studies",
                json!({ "name": name, "assignments": assignments }),
            )
            .await;
        assert_eq!(response.status(), 201);

        let body: Value = response.json().await.unwrap();
        let data = &body["data"];
        let ids = data["assignments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap().to_string())
            .collect();
        (data["id"].as_str().unwrap().to_string(), ids)
    }
}
