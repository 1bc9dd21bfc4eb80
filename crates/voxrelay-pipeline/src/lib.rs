#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Processing pipeline for stable video files: audio extraction,
//! transcription, transcript formatting, and webhook delivery.
//!
//! Layout: `extract.rs` (`ffmpeg` invocation), `transcribe.rs` (whisper CLI
//! seam), `transcript.rs` (normalization and formatting), `deliver.rs`
//! (webhook sink), `service.rs` (`PipelineService` step orchestration).

pub mod deliver;
pub mod error;
pub mod extract;
pub mod service;
pub mod transcribe;
pub mod transcript;

pub use deliver::{Notifier, WebhookNotifier, WebhookOptions};
pub use error::{PipelineError, PipelineResult};
pub use extract::{AudioExtractor, ExtractorOptions};
pub use service::PipelineService;
pub use transcribe::{Segment, SegmentIter, Transcriber, TranscriberOptions, WhisperCommand};
pub use transcript::{
    NO_SPEECH_SENTINEL, TranscriptBuilder, format_timestamp, normalize_segment,
};
