use serde::Serialize;

use crate::condition::PresenceCondition;
use crate::error::AnalysisError;
use crate::token::Span;

/// Kind of conditional branch directive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    /// `#if`
    If,
    /// `#ifdef`
    Ifdef,
    /// `#ifndef`
    Ifndef,
    /// `#elif`
    Elif,
    /// `#else`
    Else,
}

impl BranchKind {
    /// Directive name without the `#`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BranchKind::If => "if",
            BranchKind::Ifdef => "ifdef",
            BranchKind::Ifndef => "ifndef",
            BranchKind::Elif => "elif",
            BranchKind::Else => "else",
        }
    }
}

/// A branch taken by the conditional evaluator
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchRecord {
    /// Location of the directive
    pub span: Span,
    /// Directive that opened the branch
    pub kind: BranchKind,
    /// Condition selecting this branch among its siblings
    pub condition: PresenceCondition,
    /// Condition under which the branch body is compiled
    pub effective: PresenceCondition,
}

/// State of one open `#if` group
#[derive(Clone, Debug)]
pub struct ConditionalFrame {
    /// Ambient condition outside the group
    pub parent: PresenceCondition,
    /// Condition of the current branch relative to `parent`
    pub branch: PresenceCondition,
    /// Disjunction of the raw conditions of all earlier siblings
    pub prior: PresenceCondition,
    /// `parent && branch`, the ambient condition inside the branch
    pub effective: PresenceCondition,
    /// An `#else` was seen; only `#endif` may follow
    pub seen_else: bool,
    /// Location of the opening directive
    pub span: Span,
}

/// Nesting of conditional groups and the ambient condition they imply
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
    records: Vec<BranchRecord>,
}

impl ConditionalStack {
    /// Empty stack; the ambient condition is `True`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition under which the current position is compiled
    #[must_use]
    pub fn ambient(&self) -> PresenceCondition {
        self.frames
            .last()
            .map_or_else(PresenceCondition::always, |f| f.effective.clone())
    }

    fn record(&mut self, kind: BranchKind, span: Span) {
        if let Some(frame) = self.frames.last() {
            self.records.push(BranchRecord {
                span,
                kind,
                condition: frame.branch.clone(),
                effective: frame.effective.clone(),
            });
        }
    }

    /// Open a group for `#if`, `#ifdef` or `#ifndef` with its evaluated condition
    pub fn push_if(&mut self, kind: BranchKind, condition: PresenceCondition, span: Span) {
        let parent = self.ambient();
        let effective = parent.and(&condition);
        self.frames.push(ConditionalFrame {
            parent,
            branch: condition.clone(),
            prior: condition,
            effective,
            seen_else: false,
            span,
        });
        self.record(kind, span);
    }

    fn top_for(&self, directive: &str, span: Span) -> Result<&ConditionalFrame, AnalysisError> {
        let Some(frame) = self.frames.last() else {
            return Err(AnalysisError::directive(span, format!("#{directive} without #if")));
        };
        if frame.seen_else && directive != "endif" {
            return Err(AnalysisError::directive(span, format!("#{directive} after #else")));
        }
        Ok(frame)
    }

    /// Condition to evaluate an `#elif` expression under, `None` when no
    /// configuration can reach it and evaluation is skipped
    ///
    /// # Errors
    /// Returns `AnalysisError::Directive` for a stray `#elif` or one after `#else`.
    pub fn elif_scope(&self, span: Span) -> Result<Option<PresenceCondition>, AnalysisError> {
        let frame = self.top_for("elif", span)?;
        let scope = frame.parent.and(&frame.prior.not());
        Ok((!scope.is_false()).then_some(scope))
    }

    /// Switch to an `#elif` branch with the evaluated raw condition
    ///
    /// # Errors
    /// Returns `AnalysisError::Directive` for a stray `#elif` or one after `#else`.
    pub fn elif(&mut self, condition: PresenceCondition, span: Span) -> Result<(), AnalysisError> {
        self.top_for("elif", span)?;
        if let Some(frame) = self.frames.last_mut() {
            frame.branch = condition.and(&frame.prior.not());
            frame.effective = frame.parent.and(&frame.branch);
            frame.prior = frame.prior.or(&condition);
        }
        self.record(BranchKind::Elif, span);
        Ok(())
    }

    /// # Errors
    /// Returns `AnalysisError::Directive` for a stray `#else` or a second one.
    pub fn else_branch(&mut self, span: Span) -> Result<(), AnalysisError> {
        self.top_for("else", span)?;
        if let Some(frame) = self.frames.last_mut() {
            frame.branch = frame.prior.not();
            frame.effective = frame.parent.and(&frame.branch);
            frame.prior = PresenceCondition::always();
            frame.seen_else = true;
        }
        self.record(BranchKind::Else, span);
        Ok(())
    }

    /// # Errors
    /// Returns `AnalysisError::Directive` for a stray `#endif`.
    pub fn endif(&mut self, span: Span) -> Result<(), AnalysisError> {
        self.top_for("endif", span)?;
        self.frames.pop();
        Ok(())
    }

    /// Close the stack at end of file and hand out the branch records
    ///
    /// # Errors
    /// Returns `AnalysisError::Directive` pointing at the innermost group
    /// left open.
    pub fn finish(self) -> Result<Vec<BranchRecord>, AnalysisError> {
        if let Some(open) = self.frames.last() {
            return Err(AnalysisError::directive(open.span, "unterminated conditional directive"));
        }
        Ok(self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::atom;
    use pretty_assertions::assert_eq;

    #[test]
    fn sibling_branches_partition_the_parent() {
        let mut stack = ConditionalStack::new();
        stack.push_if(BranchKind::If, atom("P"), Span::default());
        stack.push_if(BranchKind::Ifdef, atom("A"), Span::default());
        let first = stack.ambient();
        stack.elif(atom("B"), Span::default()).unwrap();
        let second = stack.ambient();
        stack.else_branch(Span::default()).unwrap();
        let third = stack.ambient();

        assert!(first.provably_disjoint(&second));
        assert!(first.provably_disjoint(&third));
        assert!(second.provably_disjoint(&third));
        assert_eq!(first.or(&second).or(&third), atom("P"));

        stack.endif(Span::default()).unwrap();
        assert_eq!(stack.ambient(), atom("P"));
        stack.endif(Span::default()).unwrap();
        assert!(stack.ambient().is_true());
        assert_eq!(stack.finish().unwrap().len(), 4);
    }

    #[test]
    fn ifdef_else_are_exact_negations() {
        let mut stack = ConditionalStack::new();
        stack.push_if(BranchKind::Ifdef, atom("X"), Span::default());
        let then = stack.ambient();
        stack.else_branch(Span::default()).unwrap();
        let otherwise = stack.ambient();
        assert_eq!(otherwise, then.not());
        assert!(then.and(&otherwise).is_false());
        assert!(then.or(&otherwise).is_true());
    }

    #[test]
    fn elif_after_true_branch_is_not_evaluated() {
        let mut stack = ConditionalStack::new();
        stack.push_if(BranchKind::If, PresenceCondition::always(), Span::default());
        assert_eq!(stack.elif_scope(Span::default()).unwrap(), None);
    }

    #[test]
    fn misplaced_directives_are_errors() {
        let mut stack = ConditionalStack::new();
        assert!(stack.endif(Span::default()).is_err());
        assert!(stack.else_branch(Span::default()).is_err());
        assert!(stack.elif(atom("A"), Span::default()).is_err());

        stack.push_if(BranchKind::If, atom("A"), Span::default());
        stack.else_branch(Span::default()).unwrap();
        assert!(stack.else_branch(Span::default()).is_err());
        assert!(stack.elif_scope(Span::default()).is_err());
        assert!(matches!(stack.finish(), Err(AnalysisError::Directive { .. })));
    }
}
