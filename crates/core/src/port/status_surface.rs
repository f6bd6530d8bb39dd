// Status Surface Port
//
// The dispatch outcome must reach the operator even when an intermediary
// strips the response body, so it is attached as response metadata.

use crate::domain::StatusMessage;

pub trait StatusSurface {
    /// Attach the outcome of the current dispatch to the response
    fn attach(&mut self, status: &StatusMessage);
}
