//! Back-navigation decisions.

use narrate_core::ExitDialogData;

/// Inputs of a back press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackContext {
    /// A recovery dialog is visible.
    pub workflow_visible: bool,
    /// Narration is playing.
    pub is_reading: bool,
    pub current_index: Option<i64>,
    pub latest_index: Option<i64>,
    /// Paragraph visible on the surface, when known.
    pub visible_index: Option<i64>,
    pub total_paragraphs: usize,
    pub gap_threshold: i64,
}

/// What the coordinator does with a back press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackPlan {
    /// Let the default back behaviour (or the dialog) handle it.
    NotHandled,
    /// Stop narration, persist `save_index`, leave.
    StopAndLeave { save_index: i64 },
    /// Ask which position to keep before leaving.
    ConfirmExit(ExitDialogData),
    /// Persist the narration position and leave.
    SaveAndLeave { save_index: i64, percent: i64 },
}

impl BackPlan {
    pub const fn is_handled(self) -> bool {
        !matches!(self, Self::NotHandled)
    }
}

/// Decide how to handle a back press.
pub fn plan_back(ctx: BackContext) -> BackPlan {
    if ctx.workflow_visible {
        return BackPlan::NotHandled;
    }

    if ctx.is_reading {
        return BackPlan::StopAndLeave {
            save_index: ctx.current_index.unwrap_or(0),
        };
    }

    let tts_index = ctx.latest_index.unwrap_or(-1);
    if tts_index <= 0 {
        return BackPlan::NotHandled;
    }

    let visible = ctx.visible_index.unwrap_or(0);
    let total = i64::try_from(ctx.total_paragraphs).unwrap_or(i64::MAX);
    if (visible - tts_index).abs() > ctx.gap_threshold {
        BackPlan::ConfirmExit(ExitDialogData {
            tts_paragraph: tts_index,
            reader_paragraph: visible,
            total_paragraphs: total,
        })
    } else {
        BackPlan::SaveAndLeave {
            save_index: tts_index,
            percent: leave_percent(tts_index, total),
        }
    }
}

/// Percentage saved when leaving at `index` without a dialog.
fn leave_percent(index: i64, total: i64) -> i64 {
    let total = total.max(1);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let percent = ((index as f64 / total as f64) * 100.0).round() as i64;
    percent.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BackContext {
        BackContext {
            workflow_visible: false,
            is_reading: false,
            current_index: Some(30),
            latest_index: Some(30),
            visible_index: Some(30),
            total_paragraphs: 60,
            gap_threshold: 5,
        }
    }

    #[test]
    fn visible_dialog_is_not_intercepted() {
        let plan = plan_back(BackContext {
            workflow_visible: true,
            is_reading: true,
            ..ctx()
        });
        assert_eq!(plan, BackPlan::NotHandled);
    }

    #[test]
    fn playing_stops_and_saves_current() {
        let plan = plan_back(BackContext {
            is_reading: true,
            current_index: Some(12),
            ..ctx()
        });
        assert_eq!(plan, BackPlan::StopAndLeave { save_index: 12 });
    }

    #[test]
    fn large_gap_asks_for_confirmation() {
        let plan = plan_back(BackContext {
            visible_index: Some(36),
            ..ctx()
        });
        assert_eq!(
            plan,
            BackPlan::ConfirmExit(ExitDialogData {
                tts_paragraph: 30,
                reader_paragraph: 36,
                total_paragraphs: 60,
            })
        );
    }

    #[test]
    fn small_gap_saves_silently() {
        let plan = plan_back(BackContext {
            visible_index: Some(35),
            ..ctx()
        });
        assert_eq!(
            plan,
            BackPlan::SaveAndLeave {
                save_index: 30,
                percent: 50,
            }
        );
    }

    #[test]
    fn no_narration_history_is_not_handled() {
        for latest in [None, Some(0)] {
            let plan = plan_back(BackContext {
                latest_index: latest,
                ..ctx()
            });
            assert!(!plan.is_handled());
        }
    }
}
