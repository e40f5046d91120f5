mod http;
mod websocket;

pub use http::{health_check, stats};
pub use websocket::{chat_socket, code_socket, video_socket, whiteboard_socket};
