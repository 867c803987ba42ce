//! # Result Presenter
//!
//! The state behind the result panel: which file is previewed, whether a
//! request is in flight, and what of the verdict has arrived.
//!
//! ## States
//!
//! ```text
//! Empty ──begin──▶ Previewing(Pending) ──succeed──▶ Previewing(Succeeded)
//!                        │     ▲                          │
//!                        fail  └──────begin/regenerate────┤
//!                        ▼                                │
//!                  Previewing(Failed) ────────────────────┘
//! ```
//!
//! Every request gets a [`RequestTicket`] from a monotonically increasing
//! counter. Updates carrying anything but the latest ticket are dropped, which
//! gives last-request-wins without cancelling the superseded request.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{VerdictError, VerdictResult};
use crate::verdict::PartialVerdict;

/// Lines in the body skeleton, the last one half width.
pub const SKELETON_BODY_LINES: usize = 8;
pub const COOKING_TEXT: &str = "Chief is cooking...";

/// Identifies one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn seq(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Pending { partial: PartialVerdict },
    Succeeded(PartialVerdict),
    Failed { message: String, partial: PartialVerdict },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Pending { .. } => "pending",
            Phase::Succeeded(_) => "succeeded",
            Phase::Failed { .. } => "failed",
        }
    }

    pub fn partial(&self) -> &PartialVerdict {
        match self {
            Phase::Pending { partial } | Phase::Succeeded(partial) | Phase::Failed { partial, .. } => {
                partial
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PresenterState {
    /// No file chosen yet
    #[default]
    Empty,
    Previewing { source: PathBuf, phase: Phase },
}

/// Owns the single displayed result slot.
#[derive(Debug, Default)]
pub struct ResultPresenter {
    state: PresenterState,
    issued: u64,
    /// Precondition failure raised before any file was previewed
    notice: Option<String>,
}

impl ResultPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PresenterState {
        &self.state
    }

    pub fn source(&self) -> Option<&Path> {
        match &self.state {
            PresenterState::Empty => None,
            PresenterState::Previewing { source, .. } => Some(source),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            PresenterState::Previewing {
                phase: Phase::Pending { .. },
                ..
            }
        )
    }

    pub fn can_regenerate(&self) -> bool {
        matches!(
            self.state,
            PresenterState::Previewing {
                phase: Phase::Succeeded(_) | Phase::Failed { .. },
                ..
            }
        )
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.issued
    }

    /// Start a request for `source`, superseding whatever was displayed.
    pub fn begin(&mut self, source: impl Into<PathBuf>) -> RequestTicket {
        let ticket = self.next_ticket();
        let source = source.into();
        debug!(seq = ticket.0, source = %source.display(), "request started");
        self.notice = None;
        self.state = PresenterState::Previewing {
            source,
            phase: Phase::Pending {
                partial: PartialVerdict::default(),
            },
        };
        ticket
    }

    /// Restart from the last selected file. Only allowed once settled.
    pub fn regenerate(&mut self) -> VerdictResult<(RequestTicket, PathBuf)> {
        let source = match &self.state {
            PresenterState::Empty => {
                return Err(VerdictError::state("empty", "regenerate", "no file has been selected"));
            }
            PresenterState::Previewing {
                phase: Phase::Pending { .. },
                ..
            } => {
                return Err(VerdictError::state("pending", "regenerate", "a request is already in flight"));
            }
            PresenterState::Previewing { source, .. } => source.clone(),
        };
        let ticket = self.begin(source.clone());
        Ok((ticket, source))
    }

    /// A generation that failed before it could start (e.g. missing API key).
    ///
    /// Counts as a new request: anything in flight is superseded.
    pub fn reject(&mut self, error: &VerdictError) {
        let ticket = self.next_ticket();
        let message = error.user_message();
        debug!(seq = ticket.0, message = %message, "request rejected");
        match &mut self.state {
            PresenterState::Empty => self.notice = Some(message),
            PresenterState::Previewing { phase, .. } => {
                let partial = if matches!(phase, Phase::Pending { .. }) {
                    PartialVerdict::default()
                } else {
                    phase.partial().clone()
                };
                *phase = Phase::Failed { message, partial };
            }
        }
    }

    /// Show a streamed snapshot. Returns `false` if the ticket is stale or the
    /// request already settled.
    pub fn apply(&mut self, ticket: RequestTicket, snapshot: &PartialVerdict) -> bool {
        if !self.is_current(ticket) {
            trace!(seq = ticket.0, latest = self.issued, "stale snapshot dropped");
            return false;
        }
        match &mut self.state {
            PresenterState::Previewing {
                phase: Phase::Pending { partial },
                ..
            } => {
                partial.merge(snapshot);
                true
            }
            _ => false,
        }
    }

    /// Settle the request with its final result.
    pub fn succeed(&mut self, ticket: RequestTicket, result: impl Into<PartialVerdict>) -> bool {
        let result = result.into();
        self.settle(ticket, |partial| {
            let mut merged = partial;
            merged.merge(&result);
            Phase::Succeeded(merged)
        })
    }

    /// Settle the request with an error.
    pub fn fail(&mut self, ticket: RequestTicket, error: &VerdictError) -> bool {
        let message = error.user_message();
        self.settle(ticket, |partial| Phase::Failed { message, partial })
    }

    fn settle(&mut self, ticket: RequestTicket, to: impl FnOnce(PartialVerdict) -> Phase) -> bool {
        if !self.is_current(ticket) {
            debug!(seq = ticket.0, latest = self.issued, "stale outcome dropped");
            return false;
        }
        let PresenterState::Previewing { phase, .. } = &mut self.state else {
            return false;
        };
        let Phase::Pending { partial } = phase else {
            return false;
        };
        let next = to(std::mem::take(partial));
        debug!(seq = ticket.0, phase = next.name(), "request settled");
        *phase = next;
        true
    }

    fn next_ticket(&mut self) -> RequestTicket {
        self.issued += 1;
        RequestTicket(self.issued)
    }

    pub fn render(&self) -> View {
        match &self.state {
            PresenterState::Empty => View {
                preview: None,
                cooking: false,
                error: self.notice.clone(),
                result: None,
                can_regenerate: false,
            },
            PresenterState::Previewing { source, phase } => {
                let (cooking, error) = match phase {
                    Phase::Pending { .. } => (true, None),
                    Phase::Succeeded(_) => (false, None),
                    Phase::Failed { message, .. } => (false, Some(message.clone())),
                };
                let partial = phase.partial();
                // A failure before any field arrived leaves nothing to outline.
                let result = if matches!(phase, Phase::Failed { .. }) && partial.is_empty() {
                    None
                } else {
                    Some(ResultView::from_partial(partial))
                };
                View {
                    preview: Some(source.display().to_string()),
                    cooking,
                    error,
                    result,
                    can_regenerate: self.can_regenerate(),
                }
            }
        }
    }
}

/// One row of the result panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Skeleton { lines: usize },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub heading: Row,
    pub body: Row,
}

impl ResultView {
    fn from_partial(partial: &PartialVerdict) -> Self {
        let heading = match partial.verdict {
            Some(verdict) => {
                let rating = partial
                    .rating
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "?".to_string());
                Row::Text(format!("{} ({} / 10)", verdict.label(), rating))
            }
            None => Row::Skeleton { lines: 1 },
        };
        let body = match &partial.explanation {
            Some(text) => Row::Text(text.clone()),
            None => Row::Skeleton {
                lines: SKELETON_BODY_LINES,
            },
        };
        Self { heading, body }
    }
}

/// What the result panel shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Locally previewed file, shown before any processing
    pub preview: Option<String>,
    pub cooking: bool,
    pub error: Option<String>,
    /// `None` hides the result panel
    pub result: Option<ResultView>,
    pub can_regenerate: bool,
}

impl View {
    pub fn is_hidden(&self) -> bool {
        self.preview.is_none() && self.error.is_none() && self.result.is_none()
    }

    pub fn heading_text(&self) -> Option<&str> {
        match &self.result.as_ref()?.heading {
            Row::Text(text) => Some(text),
            Row::Skeleton { .. } => None,
        }
    }

    pub fn body_text(&self) -> Option<&str> {
        match &self.result.as_ref()?.body {
            Row::Text(text) => Some(text),
            Row::Skeleton { .. } => None,
        }
    }
}

const SKELETON_WIDTH: usize = 40;

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hidden() {
            return writeln!(f, "Upload an image to get a verdict.");
        }
        if let Some(preview) = &self.preview {
            writeln!(f, "[image] {preview}")?;
        }
        if self.cooking {
            writeln!(f, "{COOKING_TEXT}")?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "error: {error}")?;
        }
        if let Some(result) = &self.result {
            writeln!(f)?;
            match &result.heading {
                Row::Text(text) => writeln!(f, "{text}")?,
                Row::Skeleton { .. } => writeln!(f, "{}", "░".repeat(SKELETON_WIDTH / 2))?,
            }
            match &result.body {
                Row::Text(text) => writeln!(f, "{text}")?,
                Row::Skeleton { lines } => {
                    for i in 0..*lines {
                        let width = if i + 1 == *lines { SKELETON_WIDTH / 2 } else { SKELETON_WIDTH };
                        writeln!(f, "{}", "░".repeat(width))?;
                    }
                }
            }
        }
        if self.can_regenerate {
            writeln!(f, "\n[r] Regenerate")?;
        }
        Ok(())
    }
}
