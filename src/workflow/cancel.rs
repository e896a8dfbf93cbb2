use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

/// Run-wide cancellation, checked before every remote or file step.
///
/// A token without a deadline never fires. Once the deadline passes, the next
/// check fails and the workflow stops before issuing another call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn with_deadline(budget: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + budget),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn check(&self, step: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(anyhow!("cancelled before {step}: run deadline exceeded"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_token_passes() {
        assert!(CancelToken::never().check("anything").is_ok());
    }

    #[test]
    fn expired_deadline_names_the_step() {
        let token = CancelToken::with_deadline(Duration::ZERO);
        let err = token.check("delete responses").expect_err("deadline passed");
        assert!(err.to_string().contains("delete responses"));
    }

    #[test]
    fn generous_deadline_passes() {
        let token = CancelToken::with_deadline(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}
