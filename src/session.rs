//! The session driver: one in-progress parse over a shared grammar.
//!
//! A session owns the parser node arena, the explicit context stack of open
//! blocks, and the output buffer. Tokens are routed to the node owned by the
//! top of the stack; rule hooks compute explicit `Effect` values which are
//! applied centrally here after each token. A session that fails stays
//! failed; callers construct a fresh one to continue.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::diagnostics::LashError;
use crate::engine::{NodeId, ParserNode};
use crate::rules::{Grammar, RuleId};
use crate::token::Token;

// ============================================================================
// CONTEXTS
// ============================================================================

/// What kind of construct a context entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The permanent bottom entry; owns the root parser.
    Root,
    /// A `{ ... }` code block.
    Code,
    /// A `{ ... }` block opened at the start of a command line.
    Cmd,
}

/// One entry of the context stack.
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) kind: ContextKind,
    /// The parser node tokens are routed to while this entry is on top.
    pub(crate) node: NodeId,
    /// Whether the last statement completed in this context was an `if` or
    /// `elif`. `None` until any statement completes.
    pub(crate) if_statement: Option<bool>,
    /// Whether a code block just closed, which licenses a bare semicolon.
    pub(crate) after_block: bool,
    /// Set when an `if`/`elif` completes in this context; moved into
    /// `if_statement` when the statement is emitted.
    pub(crate) pending_if: bool,
    /// Text stashed by pre-block hooks, flushed at block start or statement
    /// end. Keyed by the stashing node so a re-fire replaces, never repeats.
    pub(crate) preblock: Vec<(NodeId, String)>,
}

impl Context {
    fn new(kind: ContextKind, node: NodeId) -> Context {
        Context {
            kind,
            node,
            if_statement: None,
            after_block: false,
            pending_if: false,
            preblock: Vec::new(),
        }
    }

    fn flush_preblock(&mut self) -> String {
        let mut out = String::new();
        for (_, text) in self.preblock.drain(..) {
            out.push_str(&text);
        }
        out
    }
}

// ============================================================================
// EFFECTS
// ============================================================================

/// Explicit side effects computed by rule hooks, applied in order after the
/// token that produced them has been fully consumed.
#[derive(Debug)]
pub(crate) enum Effect {
    /// Append text to the output buffer.
    Append(String),
    /// Stash (or re-stash) pre-block text on the current context.
    Stash { key: NodeId, text: String },
    /// Open a code block owned by `node`.
    BlockStart { node: NodeId },
    /// Open a command block owned by `node`.
    CmdBlockStart { node: NodeId },
    /// Close the innermost block.
    CodeBlockEnd,
    /// Close an expression block: emit its text and pop, the surrounding
    /// command parser keeps running.
    ExpBlockEnd { text: String },
    /// A statement ended at a closing brace; close the block after the
    /// statement is emitted.
    BumpLazyEnds,
    /// A bare semicolon is no longer licensed.
    ClearAfterBlock,
    /// The finished statement was an `if`/`elif`.
    MarkIf,
    /// Emit a finished statement and settle deferred block closes.
    StmtEnd { text: String },
}

// ============================================================================
// SESSION
// ============================================================================

/// An incremental parse over a shared grammar.
pub struct Session {
    pub(crate) grammar: Arc<Grammar>,
    pub(crate) nodes: Vec<ParserNode>,
    pub(crate) stack: Vec<Context>,
    pub(crate) effects: VecDeque<Effect>,
    ast: String,
    lazy_ends: u32,
    failed: bool,
}

impl Session {
    /// Starts a session parsing `root`.
    pub fn new(grammar: Arc<Grammar>, root: RuleId) -> Session {
        let mut session = Session {
            grammar,
            nodes: Vec::new(),
            stack: Vec::new(),
            effects: VecDeque::new(),
            ast: String::new(),
            lazy_ends: 0,
            failed: false,
        };
        let root_node = session.spawn(root, None);
        session.stack.push(Context::new(ContextKind::Root, root_node));
        session
    }

    /// Feeds one token. On error the session is permanently failed.
    pub fn feed(&mut self, token: Token) -> Result<(), LashError> {
        if self.failed {
            return Err(LashError::SessionFailed);
        }
        let target = self.current_node();
        let routing = self.stack.len() - 1;
        if let Err(e) = self.drive(target, &token) {
            self.effects.clear();
            self.failed = true;
            return Err(e);
        }
        if let Err(e) = self.apply_effects(routing) {
            self.failed = true;
            return Err(e);
        }
        if self.nodes[target.index()].bad {
            self.failed = true;
            return Err(LashError::Rejected { token });
        }
        Ok(())
    }

    /// Drains the output buffer.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.ast)
    }

    /// Context stack depth, counting the permanent root entry.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The node tokens are currently routed to.
    pub(crate) fn current_node(&self) -> NodeId {
        // The root sentinel is never popped, so the stack is never empty.
        self.stack[self.stack.len() - 1].node
    }

    pub(crate) fn top(&self) -> &Context {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Context {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Renders the root parser's current text. Exposed for tests and
    /// tooling; session output proper flows only through hooks.
    pub fn root_render(&self) -> String {
        self.render(self.stack[0].node)
    }

    pub fn root_is_done(&self) -> bool {
        self.nodes[self.stack[0].node.index()].done
    }

    // ------------------------------------------------------------------
    // Effect application
    // ------------------------------------------------------------------

    fn apply_effects(&mut self, routing: usize) -> Result<(), LashError> {
        while let Some(effect) = self.effects.pop_front() {
            self.apply(effect, routing)?;
        }
        Ok(())
    }

    fn apply(&mut self, effect: Effect, routing: usize) -> Result<(), LashError> {
        match effect {
            Effect::Append(text) => self.ast.push_str(&text),
            Effect::Stash { key, text } => {
                let top = self.top_mut();
                match top.preblock.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, slot)) => *slot = text,
                    None => top.preblock.push((key, text)),
                }
            }
            Effect::BlockStart { node } => {
                let stashed = self.top_mut().flush_preblock();
                self.ast.push_str(&stashed);
                self.stack.push(Context::new(ContextKind::Code, node));
                self.ast.push('{');
            }
            Effect::CmdBlockStart { node } => {
                self.stack.push(Context::new(ContextKind::Cmd, node));
                self.ast.push_str("[{");
            }
            Effect::CodeBlockEnd => self.close_block()?,
            Effect::ExpBlockEnd { text } => {
                self.ast.push_str(&text);
                self.ast.push('}');
                self.pop_block()?;
            }
            Effect::BumpLazyEnds => self.lazy_ends += 1,
            Effect::ClearAfterBlock => self.top_mut().after_block = false,
            Effect::MarkIf => {
                // The `if` completes early at its opening brace, after a
                // block context was already pushed above it. The flag
                // belongs to the context the token was routed to, where the
                // statement itself will end.
                if let Some(ctx) = self.stack.get_mut(routing) {
                    ctx.pending_if = true;
                }
            }
            Effect::StmtEnd { text } => {
                let stashed = self.top_mut().flush_preblock();
                self.ast.push_str(&stashed);
                self.ast.push_str(&text);
                let top = self.top_mut();
                let was_if = std::mem::take(&mut top.pending_if);
                top.after_block = false;
                top.if_statement = Some(was_if);
                if self.lazy_ends > 0 {
                    self.lazy_ends -= 1;
                    self.close_block()?;
                }
            }
        }
        Ok(())
    }

    /// Closes the innermost block: emit `}`, pop, and complete the block's
    /// parser so its ancestors see it finish.
    fn close_block(&mut self) -> Result<(), LashError> {
        self.ast.push('}');
        let popped = self.pop_block()?;
        match popped.kind {
            ContextKind::Cmd => self.ast.push(']'),
            _ => self.top_mut().after_block = true,
        }
        self.force_done(popped.node);
        Ok(())
    }

    fn pop_block(&mut self) -> Result<Context, LashError> {
        if self.stack.len() <= 1 {
            // The root sentinel stays; a close with no open block is a
            // grammar defect, not an input error.
            return Err(LashError::Internal {
                message: "block close with no open block".to_string(),
            });
        }
        Ok(self.stack.pop().ok_or_else(|| LashError::Internal {
            message: "context stack underflow".to_string(),
        })?)
    }
}
