pub mod callback_url;
pub mod submission;

pub use callback_url::CallbackUrl;
pub use submission::{Submission, SubmissionKind, SubmissionStatus};
