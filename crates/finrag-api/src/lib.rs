//! Axum routers for the three finrag services.
//!
//! | Service | Method | Path | Description |
//! |---------|--------|------|-------------|
//! | retriever | `POST` | `/retrieve` | Top-k TF-IDF contexts for a query. |
//! | model server | `POST` | `/generate` | Greedy answer behind the finance system prompt. |
//! | model server | `GET` | `/health` | `{"status": "ready"}` once the model is loaded. |
//! | model server | `GET` | `/load-report` | How the model was loaded, adapter status included. |
//! | gateway | `POST` | `/api/chat` | Live price, or retrieval + LLM with fallbacks. |
//! | gateway | `GET` | `/health` | Liveness. |
//!
//! Every router takes its dependencies as explicit state, so handlers can be
//! exercised with scripted retrievers and generators.
pub mod error;
pub mod gateway;
pub mod model_server;
pub mod retriever;
pub mod server;

pub use error::ApiError;
pub use gateway::{gateway_router, GatewayState};
pub use model_server::{model_server_router, ModelServerState};
pub use retriever::{retriever_router, RetrieverState};
pub use server::serve;
