//! Entity 定義
//!
//! Auxiliary Store に保存され、ワイヤー上でもそのまま配信されるレコード群。
//! JSON のフィールド名はクライアントに合わせて camelCase。

use serde::{Deserialize, Serialize};

use super::value_object::{ConnectionId, FileId, MessageContent, Timestamp, UserId};

fn default_stroke_width() -> f64 {
    2.0
}

fn default_font_size() -> f64 {
    16.0
}

/// 2 次元座標
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// ホワイトボードの描画内容
///
/// `erase` のペイロードはサーバー側では解釈しない（クライアントが合成する）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DrawingShape {
    Path {
        tool: String,
        color: String,
        #[serde(default = "default_stroke_width")]
        width: f64,
        points: Vec<Point>,
    },
    Text {
        text: String,
        position: Point,
        #[serde(default = "default_font_size")]
        font_size: f64,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
        #[serde(default)]
        fill: bool,
    },
    Circle {
        center: Point,
        radius: f64,
        color: String,
        #[serde(default)]
        fill: bool,
    },
    Diagram {
        #[serde(default)]
        elements: serde_json::Value,
    },
    Erase {
        #[serde(flatten)]
        payload: serde_json::Map<String, serde_json::Value>,
    },
}

/// サーバーが付与する描画操作のフィールド（erase のペイロードには含めない）
pub const RESERVED_OPERATION_FIELDS: [&str; 4] = ["id", "userId", "timestamp", "type"];

impl DrawingShape {
    /// コンテンツ解析フックの対象か
    pub fn is_analyzable(&self) -> bool {
        matches!(self, DrawingShape::Text { .. } | DrawingShape::Diagram { .. })
    }
}

/// サーバーが ID・時刻・作成者を付与した描画操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingOperation {
    pub id: String,
    pub user_id: UserId,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub shape: DrawingShape,
}

/// コード編集の内容（バイトオフセット基準）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CodeEdit {
    Insert { position: usize, text: String },
    Delete { position: usize, length: usize },
}

/// 受理されたコード変更レコード
///
/// `revision` は Room ごとの論理クロック値で、順序付けのためだけに使う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    pub id: String,
    pub user_id: UserId,
    pub timestamp: Timestamp,
    pub revision: u64,
    #[serde(flatten)]
    pub edit: CodeEdit,
}

/// 自動保存スナップショット（最後に受理された変更）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSave {
    pub last_change: CodeChange,
    pub saved_at: Timestamp,
}

/// 共同編集ファイルの内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    pub content: String,
    pub language: String,
}

impl FileContent {
    /// ファイルが未保存の場合の既定値
    pub fn empty(file_id: Option<FileId>, language: &str) -> Self {
        Self {
            file_id,
            content: String::new(),
            language: language.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: CursorPosition,
    pub end: CursorPosition,
}

/// ユーザーごとのカーソル状態（短い TTL で保存される）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorState {
    pub user_id: UserId,
    pub position: CursorPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    pub timestamp: Timestamp,
}

/// チャットメッセージの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    #[default]
    Text,
    Code,
    File,
    AiResponse,
    System,
}

/// チャットメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: UserId,
    pub content: MessageContent,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: Timestamp,
}

/// ビデオ通話の参加者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<serde_json::Value>,
}

/// サンドボックス実行の結果
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
}
