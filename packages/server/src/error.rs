#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("設定が不正です: {0}")]
    InvalidConfiguration(String),
    #[error("管理者のみ実行できます")]
    NotAuthorized,
    #[error("この操作は現在行えません: {0}")]
    NotEligible(String),
    #[error("ゲームが進行中です")]
    GameInProgress,
    #[error("セッションが見つかりません: {0}")]
    SessionNotFound(String),
    #[error("プレイヤーが見つかりません: {0}")]
    PlayerNotFound(String),
    #[error("セッションが満員です")]
    SessionFull,
    #[error("名前を入力してください")]
    InvalidName,
    #[error("セッションは既に停止しています")]
    SessionClosed,
}

impl GameError {
    pub fn not_eligible(reason: impl Into<String>) -> Self {
        GameError::NotEligible(reason.into())
    }
}
