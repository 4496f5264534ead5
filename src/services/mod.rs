pub mod allowance;
pub mod approval;
pub mod funding;
pub mod lifecycle;
pub mod notification_handler;
pub mod pool_actions;
pub mod pools;
pub mod stream_form;
pub mod workflow;

pub use allowance::{AllowanceState, AllowanceTracker};
pub use approval::ApprovalStep;
pub use funding::{prepare_funding, FundingOutcome, FundingRequest, FundingStep, PreparedFunding};
pub use lifecycle::{InFlight, TxLifecycle, TxObserver, TxState};
pub use notification_handler::{Notification, NotificationHandler, NotificationLevel, Notifier};
pub use pool_actions::PoolActions;
pub use pools::{MemberReward, PoolLookup, PoolService};
pub use stream_form::{ResolvedStream, StreamField, StreamForm};
pub use workflow::{apply_buffer, FundingWorkflow, WorkflowOutcome};
