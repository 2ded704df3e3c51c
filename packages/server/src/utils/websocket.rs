use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GameError;
use crate::models::{event::SessionEvent, snapshot::SessionSnapshot};
use crate::routes::ViewerQuery;
use crate::state::AppState;

/// クライアントへ送るメッセージ。スナップショットは閲覧者ごとに役職を伏せたもの。
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
enum ServerMessage {
    Snapshot { snapshot: SessionSnapshot },
    Event { event: SessionEvent },
}

pub async fn handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ViewerQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, GameError> {
    // 存在しないセッションへの接続はアップグレード前に断る
    state.session(&key).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, key, query.player_id)))
}

pub async fn handle_socket(ws: WebSocket, state: AppState, key: String, viewer: Option<String>) {
    info!("New WebSocket connection established for session: {}", key);
    let (mut snapshots, mut events) = match (
        state.subscribe(&key, viewer.clone()).await,
        state.events(&key).await,
    ) {
        (Ok(snapshots), Ok(events)) => (snapshots, events),
        _ => return,
    };

    let (mut sender, mut receiver) = ws.split();
    let key_for_send = key.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                snapshot = snapshots.next() => match snapshot {
                    Some(snapshot) => ServerMessage::Snapshot { snapshot },
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => ServerMessage::Event { event },
                    // 取りこぼした通知は次のスナップショットで追いつく
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                },
            };
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                info!("Closing WebSocket for session {}: {}", key_for_send, e);
                break;
            }
        }
    });

    // 受信側は切断の検知のみ。操作は HTTP で受け付ける。
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }
    info!("WebSocket connection closed for session: {}", key);
}
