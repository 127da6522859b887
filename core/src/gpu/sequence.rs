//! Ordering contract for one command buffer.
//!
//! Every flow records the steps it encodes into a [`SubmissionLog`] before
//! issuing the matching wgpu call. The log rejects a step that would break the
//! ordering the GPU API expects:
//!
//! - the pipeline is bound before any texture binding or dispatch in a pass,
//! - texture slot 0 is bound before dispatch,
//! - the pass is ended before the buffer is committed,
//! - the buffer is committed at most once,
//! - waiting for completion and presenting happen only after commit.

use serde::Serialize;

/// One encoded or submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    BeginPass,
    BindPipeline,
    BindTexture { slot: u32 },
    Dispatch { groups_x: u32, groups_y: u32 },
    EndPass,
    /// Copy or blit recorded on the encoder outside a compute pass.
    Copy,
    Commit,
    WaitUntilCompleted,
    Present,
}

/// A step that would violate the command-buffer ordering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("step {index}: {step:?} recorded outside an open compute pass")]
    OutsidePass { index: usize, step: Step },
    #[error("step {index}: {step:?} recorded while a compute pass is still open")]
    InsidePass { index: usize, step: Step },
    #[error("step {index}: compute pass opened while another pass is open")]
    NestedPass { index: usize },
    #[error("step {index}: texture bound before the pipeline")]
    TextureBeforePipeline { index: usize },
    #[error("step {index}: dispatch issued before the pipeline was bound")]
    DispatchWithoutPipeline { index: usize },
    #[error("step {index}: dispatch issued before texture slot 0 was bound")]
    DispatchWithoutTexture { index: usize },
    #[error("step {index}: command buffer committed with nothing encoded")]
    EmptyCommit { index: usize },
    #[error("step {index}: command buffer committed twice")]
    DoubleCommit { index: usize },
    #[error("step {index}: {step:?} recorded after commit")]
    AfterCommit { index: usize, step: Step },
    #[error("step {index}: {step:?} recorded before commit")]
    BeforeCommit { index: usize, step: Step },
}

#[derive(Debug, Default, Clone, Copy)]
struct Tracker {
    in_pass: bool,
    pipeline_bound: bool,
    texture_bound: bool,
    encoded: bool,
    committed: bool,
}

impl Tracker {
    fn advance(&mut self, index: usize, step: Step) -> Result<(), SequenceError> {
        match step {
            Step::BeginPass => {
                if self.committed {
                    return Err(SequenceError::AfterCommit { index, step });
                }
                if self.in_pass {
                    return Err(SequenceError::NestedPass { index });
                }
                self.in_pass = true;
                self.pipeline_bound = false;
                self.texture_bound = false;
            }
            Step::BindPipeline => {
                self.require_pass(index, step)?;
                self.pipeline_bound = true;
            }
            Step::BindTexture { slot } => {
                self.require_pass(index, step)?;
                if !self.pipeline_bound {
                    return Err(SequenceError::TextureBeforePipeline { index });
                }
                if slot == 0 {
                    self.texture_bound = true;
                }
            }
            Step::Dispatch { .. } => {
                self.require_pass(index, step)?;
                if !self.pipeline_bound {
                    return Err(SequenceError::DispatchWithoutPipeline { index });
                }
                if !self.texture_bound {
                    return Err(SequenceError::DispatchWithoutTexture { index });
                }
            }
            Step::EndPass => {
                self.require_pass(index, step)?;
                self.in_pass = false;
                self.encoded = true;
            }
            Step::Copy => {
                if self.committed {
                    return Err(SequenceError::AfterCommit { index, step });
                }
                if self.in_pass {
                    return Err(SequenceError::InsidePass { index, step });
                }
                self.encoded = true;
            }
            Step::Commit => {
                if self.in_pass {
                    return Err(SequenceError::InsidePass { index, step });
                }
                if self.committed {
                    return Err(SequenceError::DoubleCommit { index });
                }
                if !self.encoded {
                    return Err(SequenceError::EmptyCommit { index });
                }
                self.committed = true;
            }
            Step::WaitUntilCompleted | Step::Present => {
                if !self.committed {
                    return Err(SequenceError::BeforeCommit { index, step });
                }
            }
        }
        Ok(())
    }

    fn require_pass(&self, index: usize, step: Step) -> Result<(), SequenceError> {
        if self.in_pass {
            Ok(())
        } else {
            Err(SequenceError::OutsidePass { index, step })
        }
    }
}

/// Steps recorded for a single command buffer, in order.
#[derive(Debug, Default, Clone)]
pub struct SubmissionLog {
    steps: Vec<Step>,
    tracker: Tracker,
}

impl SubmissionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `step`, refusing it if it breaks the ordering contract.
    ///
    /// A refused step is not recorded, so the log stays valid.
    pub fn record(&mut self, step: Step) -> Result<(), SequenceError> {
        let index = self.steps.len();
        self.tracker.advance(index, step)?;
        log::debug!("step {index}: {step:?}");
        self.steps.push(step);
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_committed(&self) -> bool {
        self.tracker.committed
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

/// Check an already-recorded sequence against the ordering contract.
pub fn validate(steps: &[Step]) -> Result<(), SequenceError> {
    let mut tracker = Tracker::default();
    for (index, &step) in steps.iter().enumerate() {
        tracker.advance(index, step)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPATCH: Step = Step::Dispatch {
        groups_x: 32,
        groups_y: 32,
    };
    const TEXTURE_0: Step = Step::BindTexture { slot: 0 };

    #[test]
    fn test_offscreen_order_is_valid() {
        let steps = [
            Step::BeginPass,
            Step::BindPipeline,
            TEXTURE_0,
            DISPATCH,
            Step::EndPass,
            Step::Copy,
            Step::Commit,
            Step::WaitUntilCompleted,
        ];
        assert_eq!(validate(&steps), Ok(()));
    }

    #[test]
    fn test_live_view_order_is_valid() {
        let steps = [
            Step::BeginPass,
            Step::BindPipeline,
            TEXTURE_0,
            DISPATCH,
            Step::EndPass,
            Step::Commit,
            Step::Present,
        ];
        assert_eq!(validate(&steps), Ok(()));
    }

    #[test]
    fn test_record_refuses_and_keeps_log_intact() {
        let mut log = SubmissionLog::new();
        log.record(Step::BeginPass).unwrap();
        assert_eq!(
            log.record(DISPATCH),
            Err(SequenceError::DispatchWithoutPipeline { index: 1 })
        );
        assert_eq!(log.steps(), &[Step::BeginPass]);
        log.record(Step::BindPipeline).unwrap();
        log.record(TEXTURE_0).unwrap();
        log.record(DISPATCH).unwrap();
        assert!(!log.is_committed());
    }

    #[test]
    fn test_texture_before_pipeline() {
        let steps = [Step::BeginPass, TEXTURE_0];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::TextureBeforePipeline { index: 1 })
        );
    }

    #[test]
    fn test_dispatch_without_texture() {
        let steps = [Step::BeginPass, Step::BindPipeline, DISPATCH];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::DispatchWithoutTexture { index: 2 })
        );
    }

    #[test]
    fn test_texture_on_other_slot_does_not_satisfy_dispatch() {
        let steps = [
            Step::BeginPass,
            Step::BindPipeline,
            Step::BindTexture { slot: 1 },
            DISPATCH,
        ];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::DispatchWithoutTexture { index: 3 })
        );
    }

    #[test]
    fn test_bindings_reset_between_passes() {
        let steps = [
            Step::BeginPass,
            Step::BindPipeline,
            TEXTURE_0,
            Step::EndPass,
            Step::BeginPass,
            DISPATCH,
        ];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::DispatchWithoutPipeline { index: 5 })
        );
    }

    #[test]
    fn test_commit_with_open_pass() {
        let steps = [Step::BeginPass, Step::BindPipeline, Step::Commit];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::InsidePass {
                index: 2,
                step: Step::Commit
            })
        );
    }

    #[test]
    fn test_double_commit() {
        let steps = [Step::BeginPass, Step::EndPass, Step::Commit, Step::Commit];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::DoubleCommit { index: 3 })
        );
    }

    #[test]
    fn test_empty_commit() {
        assert_eq!(
            validate(&[Step::Commit]),
            Err(SequenceError::EmptyCommit { index: 0 })
        );
    }

    #[test]
    fn test_wait_and_present_require_commit() {
        let steps = [Step::BeginPass, Step::EndPass, Step::WaitUntilCompleted];
        assert_eq!(
            validate(&steps),
            Err(SequenceError::BeforeCommit {
                index: 2,
                step: Step::WaitUntilCompleted
            })
        );
        let steps = [Step::BeginPass, Step::EndPass, Step::Present];
        assert!(matches!(
            validate(&steps),
            Err(SequenceError::BeforeCommit { index: 2, .. })
        ));
    }

    #[test]
    fn test_nothing_encoded_after_commit() {
        let steps = [Step::BeginPass, Step::EndPass, Step::Commit, Step::Copy];
        assert!(matches!(
            validate(&steps),
            Err(SequenceError::AfterCommit { index: 3, .. })
        ));
        let steps = [Step::BeginPass, Step::EndPass, Step::Commit, Step::BeginPass];
        assert!(matches!(
            validate(&steps),
            Err(SequenceError::AfterCommit { index: 3, .. })
        ));
    }

    #[test]
    fn test_copy_inside_pass() {
        let steps = [Step::BeginPass, Step::Copy];
        assert!(matches!(
            validate(&steps),
            Err(SequenceError::InsidePass { index: 1, .. })
        ));
    }
}
