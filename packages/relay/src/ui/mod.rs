//! WebSocket / HTTP のエンドポイントとリレーの起動・停止

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::RelaySupervisor;
pub use signal::shutdown_signal;
