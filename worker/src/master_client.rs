//! The asynchronous client this worker uses to talk to `MasterService`:
//! a thin `reqwest::Client` wrapper with one method per remote
//! operation and a boxed-error result alias, covering the registration,
//! heartbeat and cache/checkpoint/pin calls the membership and command
//! protocol needs.

use std::collections::HashSet;

use reqwest::Client;

use cache_common::{
    AddCheckpointRequest, CacheFileRequest, Command, HeartbeatRequest, NetAddress, RegisterRequest,
};

pub type ClientResult<T> = Result<T, reqwest::Error>;

#[derive(Clone)]
pub struct MasterClient {
    http: Client,
    base_url: String,
}

impl MasterClient {
    pub fn new(base_url: String) -> Self {
        MasterClient { http: Client::new(), base_url }
    }

    pub async fn register(
        &self,
        address: NetAddress,
        total_bytes: i64,
        used_bytes: i64,
        current_files: Vec<i32>,
    ) -> ClientResult<i64> {
        self.http
            .post(format!("{}/worker/register", self.base_url))
            .json(&RegisterRequest { address, total_bytes, used_bytes, current_files })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    pub async fn heartbeat(
        &self,
        worker_id: i64,
        used_bytes: i64,
        removed_file_ids: Vec<i32>,
    ) -> ClientResult<Command> {
        self.http
            .post(format!("{}/worker/heartbeat", self.base_url))
            .json(&HeartbeatRequest { worker_id, used_bytes, removed_file_ids })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    pub async fn cache_file(
        &self,
        worker_id: i64,
        worker_used_bytes: i64,
        file_id: i32,
        file_size_bytes: i64,
    ) -> ClientResult<()> {
        self.http
            .post(format!("{}/worker/cacheFile", self.base_url))
            .json(&CacheFileRequest { worker_id, worker_used_bytes, file_id, file_size_bytes })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn add_checkpoint(
        &self,
        worker_id: i64,
        file_id: i32,
        file_size_bytes: i64,
        checkpoint_path: String,
    ) -> ClientResult<bool> {
        self.http
            .post(format!("{}/worker/addCheckpoint", self.base_url))
            .json(&AddCheckpointRequest { worker_id, file_id, file_size_bytes, checkpoint_path })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    pub async fn pin_id_list(&self) -> ClientResult<HashSet<i32>> {
        self.http
            .get(format!("{}/worker/pinIdList", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    pub async fn out_of_memory_for_pin_file(&self, file_id: i32) -> ClientResult<()> {
        self.http
            .post(format!("{}/user/outOfMemoryForPin/{file_id}", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
