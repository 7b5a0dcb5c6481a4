pub mod analysis;
pub mod chat;
pub mod dashboard;
pub mod feedback;

pub use analysis::{handle_analyze, AnalysisResponse, ColorInfo, __path_handle_analyze};
pub use chat::{
    handle_ask, handle_create_session, handle_delete_session, handle_get_session,
    handle_session_analyze, handle_stop, AskRequest, CreateSessionResponse,
    SessionAnalysisResponse, StopResponse, __path_handle_ask, __path_handle_create_session,
    __path_handle_delete_session, __path_handle_get_session, __path_handle_session_analyze,
    __path_handle_stop,
};
pub use dashboard::{
    handle_dashboard, handle_export, DashboardResponse, DashboardState, __path_handle_dashboard,
    __path_handle_export,
};
pub use feedback::{
    handle_feedback_options, handle_submit_feedback, FeedbackOptions, FeedbackResponse,
    FormDefaults, __path_handle_feedback_options, __path_handle_submit_feedback,
};
