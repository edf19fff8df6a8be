//! Orchestration core: credentials, credit, payload building, submission,
//! polling, and result extraction.

pub mod builder;
pub mod catalog;
pub mod credentials;
pub mod credit;
pub mod extract;
pub mod http;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod poll;
pub mod submit;

pub use builder::{IdSource, JobBuilder, RandomIds, Submission};
pub use catalog::{ModelCatalog, ModelTable, ProviderModel};
pub use credentials::{Credential, CredentialPool};
pub use credit::CreditGate;
pub use http::{HttpTransport, RequestParts, ServiceEndpoint, Transport};
pub use models::{
    CreditBalance, GenerationOutput, Geometry, ImageParams, Job, JobKind, JobParams, JobRequest,
    JobStatus, ReferenceParams, VideoParams,
};
pub use pipeline::Orchestrator;
pub use poll::PollLoop;
pub use submit::JobSubmitter;
