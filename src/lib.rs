//! # virtual-tryon
//!
//! Core of a three-step virtual try-on wizard: pick a person photo, pick or
//! generate a garment, and get an AI-generated composite of the person
//! wearing it. Images are generated by Gemini's `generateContent` endpoint
//! (`gemini-2.5-flash-image` by default).
//!
//! The crate contains no rendering code. A frontend drives a [`Session`],
//! renders the [`WizardSnapshot`]s it publishes, and offers the
//! [`DownloadFile`]s it produces.
//!
//! ## Features
//!
//! - **Asset encoding**: remote URLs and local files become data URLs,
//!   since the model only accepts inline images
//! - **Garment synthesis** from a text description
//! - **Try-on synthesis** from a person image and a garment image
//! - **Guarded generation**: entering the result step starts at most one
//!   request, and results for abandoned selections are dropped
//! - **Session history** with deterministic download names
//!
//! ## Quick Start
//!
//! ```no_run
//! use virtual_tryon::{Session, TryOnConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::gemini(TryOnConfig::from_env()?)?;
//!
//!     session.choose_preset_person("p1")?;
//!     session.advance_to_garment()?;
//!     session.generate_garment("red silk gown").await?;
//!
//!     if session.enter_result_step().await?.is_some() {
//!         let file = session.download_result()?;
//!         std::fs::write(&file.file_name, &file.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod download;
pub mod encoder;
pub mod error;
pub mod history;
pub mod prompt;
pub mod session;
pub mod types;
pub mod wizard;

pub use catalog::Catalog;
pub use client::{GeminiClient, ImageGenerator};
pub use config::{TryOnConfig, TryOnConfigBuilder};
pub use download::DownloadFile;
pub use encoder::{encode_bytes, encode_local_file, encode_remote, DataUrl, UploadRole};
pub use error::{Result, TransitionError, TryOnError};
pub use history::HistoryLedger;
pub use session::{Session, WizardSnapshot};
pub use types::{GenerationStatus, HistoryEntry, ImageOrigin, ImageReference, Step};
pub use wizard::{GenerationTicket, WizardState};
