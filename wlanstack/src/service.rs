// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Control socket for operator commands. One JSON request per connection;
//! the reply carries the closed error-code set of the wlan API.

use crate::client::{ApInfo, Command, ErrCode, ScanParams, ServiceError};
use crate::config::Config;
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Scan {
        #[serde(default)]
        timeout: i32,
    },
    Connect {
        ssid: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        bssid: Option<String>,
        #[serde(default)]
        scan_interval: Option<u32>,
    },
    Disconnect,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Scan { .. } => "scan",
            Request::Connect { .. } => "connect",
            Request::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Ok,
    NotFound,
    InvalidArgs,
    NotSupported,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: Code,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub error: ErrorReply,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aps: Option<Vec<ApInfo>>,
}

impl Reply {
    fn ok() -> Reply {
        Reply {
            error: ErrorReply { code: Code::Ok, description: String::new() },
            aps: None,
        }
    }

    fn with_aps(aps: Vec<ApInfo>) -> Reply {
        Reply { aps: Some(aps), ..Reply::ok() }
    }

    fn error(err: ServiceError) -> Reply {
        let code = match err.code {
            ErrCode::NotFound => Code::NotFound,
            ErrCode::InvalidArgs => Code::InvalidArgs,
            ErrCode::NotSupported => Code::NotSupported,
            ErrCode::Internal => Code::Internal,
        };
        Reply { error: ErrorReply { code, description: err.description }, aps: None }
    }
}

/// Serves the control API, forwarding requests into the client's command
/// queue. Each connection is handled on its own task so a slow requester
/// cannot stall the listener.
pub async fn serve(
    listener: UnixListener,
    commands: mpsc::Sender<Command>,
) -> Result<(), anyhow::Error> {
    loop {
        let (stream, _addr) = listener.accept().await?;
        let commands = commands.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, commands).await {
                error!("error handling control connection: {}", e);
            }
        });
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    commands: mpsc::Sender<Command>,
) -> Result<(), anyhow::Error> {
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await?;

    let reply = match serde_json::from_slice::<Request>(&buffer) {
        Ok(request) => {
            // Never log the request body; connect carries credentials.
            info!("control request: {}", request.name());
            dispatch(request, &commands).await
        }
        Err(e) => Reply::error(ServiceError::invalid_args(format!(
            "failed to parse request: {}",
            e
        ))),
    };

    stream.write_all(&serde_json::to_vec(&reply)?).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn dispatch(request: Request, commands: &mpsc::Sender<Command>) -> Reply {
    match request {
        Request::Scan { timeout } => {
            let (responder, receiver) = oneshot::channel();
            let cmd = Command::Scan(ScanParams { timeout }, responder);
            await_reply(commands, cmd, receiver).await.map_or_else(Reply::error, Reply::with_aps)
        }
        Request::Connect { ssid, password, bssid, scan_interval } => {
            let cfg = Config { ssid, bssid, password, scan_interval };
            let (responder, receiver) = oneshot::channel();
            let cmd = Command::SetScanConfig(cfg, responder);
            await_reply(commands, cmd, receiver).await.map_or_else(Reply::error, |()| Reply::ok())
        }
        Request::Disconnect => {
            let (responder, receiver) = oneshot::channel();
            let cmd = Command::Disconnect(responder);
            await_reply(commands, cmd, receiver).await.map_or_else(Reply::error, |()| Reply::ok())
        }
    }
}

async fn await_reply<T>(
    commands: &mpsc::Sender<Command>,
    cmd: Command,
    receiver: oneshot::Receiver<Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    if commands.send(cmd).await.is_err() {
        return Err(ServiceError::internal("wlan client is not running"));
    }
    match receiver.await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::internal("wlan client dropped the command")),
    }
}
