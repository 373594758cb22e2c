mod job;
mod state;

pub use job::{
    AccessUrl, CredentialRef, Job, JobPatch, JobRecord, JobSpec, TakeoutFile, TakeoutSource,
    TransferSource,
};
pub use state::{JobStatus, StateMachine, Transition};
