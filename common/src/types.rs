//! Record shapes from spec section 6, plus the request bodies needed to
//! carry their arguments over the HTTP/JSON transport `master` and
//! `worker` use for their mutual RPCs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetAddress {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFileInfo {
    pub id: i32,
    pub name: String,
    pub path: String,
    pub checkpoint_path: String,
    pub size_bytes: i64,
    pub creation_time_ms: i64,
    pub ready: bool,
    pub folder: bool,
    pub in_memory: bool,
    pub need_pin: bool,
    pub need_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientWorkerInfo {
    pub id: i64,
    pub address: NetAddress,
    pub last_contact_sec: i64,
    pub state: String,
    pub capacity_bytes: i64,
    pub used_bytes: i64,
    pub starttime_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRawTableInfo {
    pub id: i32,
    pub name: String,
    pub path: String,
    pub columns: u32,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandType {
    Unknown = 0,
    Nothing = 1,
    Register = 2,
    Free = 3,
    Delete = 4,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: CommandType,
    pub data: Vec<i32>,
}

impl Command {
    pub fn nothing() -> Self {
        Command {
            kind: CommandType::Nothing,
            data: Vec::new(),
        }
    }

    pub fn register() -> Self {
        Command {
            kind: CommandType::Register,
            data: Vec::new(),
        }
    }

    pub fn free(file_ids: Vec<i32>) -> Self {
        Command {
            kind: CommandType::Free,
            data: file_ids,
        }
    }

    pub fn delete(file_ids: Vec<i32>) -> Self {
        Command {
            kind: CommandType::Delete,
            data: file_ids,
        }
    }
}

// --- MasterService request bodies -----------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: NetAddress,
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub current_files: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: i64,
    pub used_bytes: i64,
    pub removed_file_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFileRequest {
    pub worker_id: i64,
    pub worker_used_bytes: i64,
    pub file_id: i32,
    pub file_size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCheckpointRequest {
    pub worker_id: i64,
    pub file_id: i32,
    pub file_size_bytes: i64,
    pub checkpoint_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRawTableRequest {
    pub path: String,
    pub columns: u32,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRawTableMetadataRequest {
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub dst: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorkerRequest {
    pub random: bool,
    pub host: String,
}
