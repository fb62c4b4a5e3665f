//! Control-transfer classification.
//!
//! While the engine rewrites a frame body it keeps a [`LabelEnv`]: the
//! stack of loop-like scopes between the statement under inspection and
//! the function body. Classification walks that stack to decide what a
//! `break`, `continue` or `goto` means relative to the frame the
//! statement sits in:
//!
//! - resolved inside the current frame (or an ordinary loop within it):
//!   the statement stays as it is, or becomes a plain `return false` /
//!   `return true` out of the synthesized closure;
//! - resolved by an outer frame of the same nest: the transfer must ride
//!   the shared transfer code upward through the iterator calls;
//! - resolved outside the nest entirely: the transfer gets a dedicated
//!   negative code and is replayed by the guard of the outermost frame
//!   that still sits inside the target construct.

use reed_diagnostics::Span;
use reed_hir::{Stmt, StmtKind};
use reed_types::{LabelId, LocalId};
use std::collections::HashMap;

/// One push-style loop of a nest, in discovery order (index 0 is the
/// root). The parent links form the frame tree; `depth` is 1 for the
/// root and grows inward.
#[derive(Debug)]
pub(crate) struct FramePlan {
    pub parent: Option<usize>,
    pub depth: usize,
    pub label: Option<LabelId>,
    /// The frame's exited flag.
    pub exit_local: LocalId,
    pub span: Span,
}

/// Kind of an escalated branch that resolves outside the nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchKind {
    Goto,
    Break,
    Continue,
}

/// A scope on the path from the function body down to the statement
/// being classified.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope {
    /// A push-style frame of the current nest.
    Frame { index: usize },
    /// An ordinary loop.
    Ordinary { label: Option<LabelId> },
}

/// Stack of scopes maintained by the engine during a frame-body walk.
#[derive(Debug, Default)]
pub(crate) struct LabelEnv {
    scopes: Vec<Scope>,
}

impl LabelEnv {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub(crate) fn pop(&mut self) {
        self.scopes.pop();
    }

    /// The innermost frame index, i.e. the frame whose closure body the
    /// walk is currently inside.
    pub(crate) fn current_frame(&self) -> Option<usize> {
        self.scopes.iter().rev().find_map(|s| match s {
            Scope::Frame { index } => Some(*index),
            Scope::Ordinary { .. } => None,
        })
    }
}

/// What a control-transfer statement turned out to mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Resolved by an ordinary construct inside the current frame; the
    /// statement is left untouched.
    Keep,
    /// Exits or repeats the current frame itself: becomes a plain
    /// `return false` / `return true` from the synthesized closure.
    LocalExit { repeat: bool },
    /// Exits or repeats an outer frame of the same nest. Rides a
    /// positive transfer code derived from the depth difference.
    OuterFrame { target: usize, repeat: bool },
    /// Resolves outside the nest: `goto`, or `break`/`continue` of an
    /// ordinary loop beyond at least one frame boundary. `site` is the
    /// frame whose post-call guard replays the statement (0 means the
    /// continuation after the root frame's call).
    Escalated {
        kind: BranchKind,
        label: LabelId,
        site: usize,
    },
}

/// Classify a `break` seen inside a frame body.
///
/// Returns `None` when a label was given and nothing in scope carries
/// it; the caller reports the unresolved-label fault.
pub(crate) fn classify_break(
    env: &LabelEnv,
    frames: &[FramePlan],
    label: Option<LabelId>,
) -> Option<Verdict> {
    classify_loop_transfer(env, frames, label, false)
}

/// Classify a `continue` seen inside a frame body.
pub(crate) fn classify_continue(
    env: &LabelEnv,
    frames: &[FramePlan],
    label: Option<LabelId>,
) -> Option<Verdict> {
    classify_loop_transfer(env, frames, label, true)
}

fn classify_loop_transfer(
    env: &LabelEnv,
    frames: &[FramePlan],
    label: Option<LabelId>,
    repeat: bool,
) -> Option<Verdict> {
    // Frame boundaries crossed so far, innermost first. The first entry
    // is always the current frame.
    let mut crossed: Vec<usize> = Vec::new();
    for scope in env.scopes.iter().rev() {
        match scope {
            Scope::Ordinary { label: l } => match label {
                // A naked transfer binds to the nearest loop of any kind.
                None => return Some(Verdict::Keep),
                Some(want) if *l == Some(want) => {
                    return Some(match crossed.last() {
                        None => Verdict::Keep,
                        Some(site) => Verdict::Escalated {
                            kind: if repeat {
                                BranchKind::Continue
                            } else {
                                BranchKind::Break
                            },
                            label: want,
                            site: *site,
                        },
                    });
                }
                Some(_) => {}
            },
            Scope::Frame { index } => {
                let matches = match label {
                    None => true,
                    Some(want) => frames[*index].label == Some(want),
                };
                if matches {
                    return Some(if crossed.is_empty() {
                        Verdict::LocalExit { repeat }
                    } else {
                        Verdict::OuterFrame {
                            target: *index,
                            repeat,
                        }
                    });
                }
                crossed.push(*index);
            }
        }
    }
    None
}

/// Classify a `goto` seen inside a frame body.
///
/// `anchors` maps each label-marker statement to the frame whose body
/// lexically contains it (`None` for markers at function scope). A
/// marker inside the current frame's closure keeps the `goto` local; a
/// marker in an ancestor frame escalates it, replayed at the guard that
/// follows the ancestor's child on the current path; a marker at
/// function scope is replayed by the continuation.
pub(crate) fn classify_goto(
    env: &LabelEnv,
    anchors: &HashMap<LabelId, Option<usize>>,
    label: LabelId,
) -> Option<Verdict> {
    let owner = *anchors.get(&label)?;
    let current = env.current_frame()?;
    match owner {
        Some(frame) if frame == current => Some(Verdict::Keep),
        None => Some(Verdict::Escalated {
            kind: BranchKind::Goto,
            label,
            site: 0,
        }),
        Some(frame) => {
            // Find the child of the owner frame on the current path; its
            // guard sits inside the owner's closure where the marker is
            // in scope.
            let mut child = None;
            for scope in env.scopes.iter().rev() {
                if let Scope::Frame { index } = scope {
                    if *index == frame {
                        return child.map(|site| Verdict::Escalated {
                            kind: BranchKind::Goto,
                            label,
                            site,
                        });
                    }
                    child = Some(*index);
                }
            }
            // Marker lives in a frame that is not an ancestor: the jump
            // would enter a loop body sideways. Resolution rejects this
            // in well-formed input.
            None
        }
    }
}

/// Record the label markers directly owned by a statement list.
///
/// Does not descend into push-style loop bodies or closures; those
/// scopes own their markers and are collected when entered. `owner` is
/// the frame owning this list, `None` at function scope.
pub(crate) fn collect_label_anchors(
    stmts: &[Stmt],
    owner: Option<usize>,
    anchors: &mut HashMap<LabelId, Option<usize>>,
) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Label(label) => {
                anchors.insert(*label, owner);
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_label_anchors(then_branch, owner, anchors);
                if let Some(els) = else_branch {
                    collect_label_anchors(els, owner, anchors);
                }
            }
            StmtKind::While { body, .. } | StmtKind::Block(body) => {
                collect_label_anchors(body, owner, anchors);
            }
            _ => {}
        }
    }
}
