//! Roundup engine: backend client, session lifecycle, status polling and the
//! orchestrator that executes core effects.
mod client;
mod orchestrator;
mod persist;
mod poller;
mod session;
mod types;

pub use client::{ClientSettings, PipelineApi, ReqwestPipelineClient, DEFAULT_ARTIFACT_FILENAME};
pub use orchestrator::{Orchestrator, RunEvent, TriggerReceipt};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use poller::{PollSettings, RunListener, RunStatusPoller};
pub use session::{SessionEvent, SessionManager, TOKEN_KEY};
pub use types::{
    ApiError, ArtifactInfo, DownloadedArtifact, FailureKind, LatestResult, StatusReport,
    TriggerResponse,
};
