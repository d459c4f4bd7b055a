#[cfg(not(target_arch = "wasm32"))]
pub mod export;
pub mod gateway;
pub mod genai;
pub mod pipeline;
