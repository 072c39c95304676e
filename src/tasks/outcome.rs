//! # Task outcome.
//!
//! [`Outcome`] classifies how a work function ended. It is carried by
//! [`EventKind::TaskCompleted`](crate::EventKind::TaskCompleted) events.

use std::sync::Arc;

use crate::error::TaskError;

/// How a task ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Work returned `Ok(())`.
    Success,
    /// Work observed cancellation and returned [`TaskError::Canceled`].
    Canceled,
    /// Work returned an error.
    Failed {
        /// Stable label of the error (see [`TaskError::as_label`]).
        label: &'static str,
        /// Error message.
        message: Arc<str>,
    },
    /// Work panicked.
    Panicked {
        /// `true` if fault recovery caught the panic at the task boundary.
        recovered: bool,
        /// Panic payload rendered as text.
        message: Arc<str>,
    },
    /// The future was dropped before completing (runtime shutdown or abort).
    Aborted,
}

impl Outcome {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Canceled => "canceled",
            Outcome::Failed { .. } => "failed",
            Outcome::Panicked { .. } => "panicked",
            Outcome::Aborted => "aborted",
        }
    }

    /// Returns `true` for [`Outcome::Success`] and [`Outcome::Canceled`].
    pub fn is_graceful(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Canceled)
    }

    pub(crate) fn from_result(res: Result<(), TaskError>) -> Self {
        match res {
            Ok(()) => Outcome::Success,
            Err(TaskError::Canceled) => Outcome::Canceled,
            Err(e) => Outcome::Failed {
                label: e.as_label(),
                message: e.to_string().into(),
            },
        }
    }

    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send), recovered: bool) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Outcome::Panicked {
            recovered,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result() {
        assert_eq!(Outcome::from_result(Ok(())), Outcome::Success);
        assert_eq!(
            Outcome::from_result(Err(TaskError::Canceled)),
            Outcome::Canceled
        );
        let failed = Outcome::from_result(Err(TaskError::fail("db down")));
        assert_eq!(failed.as_label(), "failed");
        assert!(!failed.is_graceful());
    }

    #[test]
    fn test_from_panic_payloads() {
        let p: Box<dyn std::any::Any + Send> = Box::new("static boom");
        assert_eq!(
            Outcome::from_panic(p.as_ref(), true),
            Outcome::Panicked {
                recovered: true,
                message: "static boom".into()
            }
        );

        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        match Outcome::from_panic(p.as_ref(), false) {
            Outcome::Panicked { recovered, message } => {
                assert!(!recovered);
                assert_eq!(&*message, "owned boom");
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let p: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(
            Outcome::from_panic(p.as_ref(), true),
            Outcome::Panicked {
                recovered: true,
                message: "unknown panic".into()
            }
        );
    }
}
