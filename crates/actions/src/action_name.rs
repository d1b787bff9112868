//! Action-name slash-paths (§4.3), used as the keysplitting `action` field.

/// Single-shot Kubernetes API proxy request.
pub const RESTAPI_REQUEST: &str = "kube/restapi/request";

/// Opens an interactive exec stream.
pub const EXEC_START: &str = "kube/exec/start";
/// Carries stdin bytes to a running exec stream.
pub const EXEC_INPUT: &str = "kube/exec/input";
/// Carries a terminal resize.
pub const EXEC_RESIZE: &str = "kube/exec/resize";
/// Closes an exec stream from either side.
pub const EXEC_STOP: &str = "kube/exec/stop";

/// Opens a long-running cluster log reader.
pub const LOG_START: &str = "kube/log/start";
/// Cancels a log reader.
pub const LOG_STOP: &str = "kube/log/stop";

/// Opens the port-forward action and its SPDY connection.
pub const PORTFORWARD_START: &str = "kube/portforward/start";
/// Carries data-stream bytes from the local tool to the pod.
pub const PORTFORWARD_DATAIN: &str = "kube/portforward/datain";
/// Carries error-stream bytes from the local tool to the pod.
pub const PORTFORWARD_ERRORIN: &str = "kube/portforward/errorin";
/// Agent's readiness/error signal for the whole port-forward action.
pub const PORTFORWARD_READY: &str = "kube/portforward/ready";
/// Pod-to-tool data-stream bytes.
pub const PORTFORWARD_DATA: &str = "kube/portforward/data";
/// Pod-to-tool error-stream bytes.
pub const PORTFORWARD_ERROR: &str = "kube/portforward/error";
/// Tears down the whole port-forward action.
pub const PORTFORWARD_STOP: &str = "kube/portforward/stop";
/// Closes a single inner connection, leaving the action open.
pub const PORTFORWARD_REQUEST_STOP: &str = "kube/portforward/request/stop";
