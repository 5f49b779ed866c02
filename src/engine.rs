//! The per-node parsing runtime.
//!
//! Every rule in flight gets a node in the session's arena. A node consumes
//! one token at a time and afterwards reports `done` (it would accept being
//! finished here, though it may still extend) and `bad` (it can never match).
//! Sequences are the interesting case: a done child that rejects a token is
//! "force-advanced" past, and a child that consumed tokens while exploring an
//! extension has that backlog replayed into the following items when the
//! extension fails. Rendered text is captured as a snapshot every time a
//! child reports done, so text from a failed extension is never emitted.

use std::sync::Arc;

use crate::diagnostics::LashError;
use crate::rules::{Hook, RuleBody, RuleId};
use crate::session::{Effect, Session};
use crate::token::Token;

/// Index of a parser node within its session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One in-flight parser.
#[derive(Debug)]
pub(crate) struct ParserNode {
    pub(crate) rule: RuleId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) done: bool,
    pub(crate) bad: bool,
    /// Completed from outside; the next token it sees turns it bad.
    pub(crate) sealed: bool,
    pub(crate) state: NodeState,
}

/// A sequence child and the text snapshot taken at its last done.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) node: NodeId,
    pub(crate) text: String,
}

/// One alternative of an alternation.
#[derive(Debug)]
pub(crate) struct Alt {
    pub(crate) node: NodeId,
    pub(crate) alive: bool,
}

#[derive(Debug)]
pub(crate) enum NodeState {
    /// Terminal and value rules: the rendered text once matched.
    Leaf { text: Option<String> },
    Seq {
        pos: usize,
        slots: Vec<Slot>,
        /// Tokens consumed by the current child while not done; replayed
        /// into the following items if the child turns bad.
        accum: Vec<Token>,
    },
    Or {
        alts: Vec<Alt>,
        started: bool,
    },
    Repeat {
        /// Concatenated text of confirmed instances.
        done_text: String,
        current: Option<NodeId>,
        /// Snapshot of the current instance at its last done.
        current_text: String,
    },
    Action { inner: Option<NodeId> },
}

impl Session {
    // ========================================================================
    // Node construction
    // ========================================================================

    pub(crate) fn spawn(&mut self, rule: RuleId, parent: Option<NodeId>) -> NodeId {
        let state = match &self.grammar.rule(rule).body {
            RuleBody::Terminal { .. } | RuleBody::Value { .. } => NodeState::Leaf { text: None },
            RuleBody::Seq { .. } => NodeState::Seq {
                pos: 0,
                slots: Vec::new(),
                accum: Vec::new(),
            },
            RuleBody::Or { .. } => NodeState::Or {
                alts: Vec::new(),
                started: false,
            },
            RuleBody::Repeat { .. } => NodeState::Repeat {
                done_text: String::new(),
                current: None,
                current_text: String::new(),
            },
            RuleBody::Action { .. } => NodeState::Action { inner: None },
        };
        let done = self.grammar.init_done(rule);
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ParserNode {
            rule,
            parent,
            done,
            bad: false,
            sealed: false,
            state,
        });
        id
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Feeds one token to a node.
    pub(crate) fn drive(&mut self, id: NodeId, token: &Token) -> Result<(), LashError> {
        {
            let node = &mut self.nodes[id.index()];
            if node.bad || node.sealed {
                node.bad = true;
                node.done = false;
                return Ok(());
            }
        }
        let grammar = Arc::clone(&self.grammar);
        match &grammar.rule(self.nodes[id.index()].rule).body {
            RuleBody::Terminal { kind, message } => {
                self.drive_leaf(id, token, *kind, message.clone());
                Ok(())
            }
            RuleBody::Value { kind } => {
                self.drive_leaf(id, token, *kind, None);
                Ok(())
            }
            RuleBody::Seq { .. } => self.drive_seq(id, token),
            RuleBody::Or { .. } => self.drive_or(id, token),
            RuleBody::Repeat { .. } => self.drive_repeat(id, token),
            RuleBody::Action { .. } => self.drive_action(id, token),
        }
    }

    fn drive_leaf(
        &mut self,
        id: NodeId,
        token: &Token,
        expect: crate::token::TokenKind,
        message: Option<String>,
    ) {
        let node = &mut self.nodes[id.index()];
        let NodeState::Leaf { text } = &mut node.state else {
            return;
        };
        if text.is_some() {
            // A leaf matches exactly one token; a second turns it bad.
            node.bad = true;
            node.done = false;
        } else if token.kind == expect {
            *text = Some(message.unwrap_or_else(|| token.text.clone()));
            node.done = true;
        } else {
            node.bad = true;
            node.done = false;
        }
    }

    fn drive_seq(&mut self, id: NodeId, token: &Token) -> Result<(), LashError> {
        let grammar = Arc::clone(&self.grammar);
        let RuleBody::Seq { items, .. } = &grammar.rule(self.nodes[id.index()].rule).body else {
            return Ok(());
        };

        let pos = match &self.nodes[id.index()].state {
            NodeState::Seq { pos, .. } => *pos,
            _ => 0,
        };
        if pos >= items.len() {
            let node = &mut self.nodes[id.index()];
            node.bad = true;
            node.done = false;
            return Ok(());
        }

        // Materialize the child for this position on first contact.
        let child = {
            let have = match &self.nodes[id.index()].state {
                NodeState::Seq { slots, .. } => slots.len(),
                _ => 0,
            };
            if have == pos {
                let rule = grammar.resolved(&items[pos]);
                let c = self.spawn(rule, Some(id));
                if let NodeState::Seq { slots, .. } = &mut self.nodes[id.index()].state {
                    slots.push(Slot {
                        node: c,
                        text: String::new(),
                    });
                }
                c
            } else {
                match &self.nodes[id.index()].state {
                    NodeState::Seq { slots, .. } => slots[pos].node,
                    _ => unreachable!(),
                }
            }
        };

        let wasdone = self.nodes[child.index()].done;
        self.drive(child, token)?;
        let child_bad = self.nodes[child.index()].bad;
        let child_done = self.nodes[child.index()].done;
        let last = pos == items.len() - 1;

        if last {
            // The last position gets no force-advance: its failure is ours.
            if child_bad {
                let node = &mut self.nodes[id.index()];
                node.bad = true;
                node.done = false;
            } else {
                if child_done {
                    let text = self.render(child);
                    if let NodeState::Seq { slots, .. } = &mut self.nodes[id.index()].state {
                        slots[pos].text = text;
                    }
                }
                self.nodes[id.index()].done = child_done;
            }
            return Ok(());
        }

        if child_bad {
            if wasdone {
                // The child already matched; treat this token as never seen
                // by it and move on. Its snapshot is from its last done.
                if let NodeState::Seq { pos, accum, .. } = &mut self.nodes[id.index()].state {
                    *pos += 1;
                    accum.clear();
                }
                return self.drive_seq(id, token);
            }
            let backlog = match &mut self.nodes[id.index()].state {
                NodeState::Seq { accum, .. } if !accum.is_empty() => {
                    let mut b = std::mem::take(accum);
                    b.push(token.clone());
                    Some(b)
                }
                _ => None,
            };
            if let Some(backlog) = backlog {
                // The child consumed these while exploring an extension it
                // never completed; replay them into the following items.
                if let NodeState::Seq { pos, .. } = &mut self.nodes[id.index()].state {
                    *pos += 1;
                }
                for t in backlog {
                    if self.nodes[id.index()].bad {
                        break;
                    }
                    self.drive_seq(id, &t)?;
                }
                return Ok(());
            }
            let node = &mut self.nodes[id.index()];
            node.bad = true;
            node.done = false;
            return Ok(());
        }

        if child_done {
            let text = self.render(child);
            let early = items[pos + 1..]
                .iter()
                .all(|r| grammar.is_zero_repeat(grammar.resolved(r)));
            if let NodeState::Seq { slots, accum, .. } = &mut self.nodes[id.index()].state {
                slots[pos].text = text;
                accum.clear();
            }
            if early {
                // Everything left may match zero tokens, so the whole
                // sequence would accept being finished here.
                self.nodes[id.index()].done = true;
            }
        } else if let NodeState::Seq { accum, .. } = &mut self.nodes[id.index()].state {
            // Mid-extension: not done, not bad. Done-ness is left alone so an
            // early-done sequence stays done while the child explores.
            accum.push(token.clone());
        }
        Ok(())
    }

    fn drive_or(&mut self, id: NodeId, token: &Token) -> Result<(), LashError> {
        let grammar = Arc::clone(&self.grammar);
        let RuleBody::Or { alts: alt_refs, .. } = &grammar.rule(self.nodes[id.index()].rule).body
        else {
            return Ok(());
        };

        let started = match &self.nodes[id.index()].state {
            NodeState::Or { started, .. } => *started,
            _ => true,
        };
        if !started {
            let rules: Vec<RuleId> = alt_refs.iter().map(|r| grammar.resolved(r)).collect();
            let spawned: Vec<NodeId> = rules.into_iter().map(|r| self.spawn(r, Some(id))).collect();
            if let NodeState::Or { alts, started } = &mut self.nodes[id.index()].state {
                *alts = spawned
                    .into_iter()
                    .map(|node| Alt { node, alive: true })
                    .collect();
                *started = true;
            }
        }

        let count = match &self.nodes[id.index()].state {
            NodeState::Or { alts, .. } => alts.len(),
            _ => 0,
        };
        for i in 0..count {
            let (node, alive) = match &self.nodes[id.index()].state {
                NodeState::Or { alts, .. } => (alts[i].node, alts[i].alive),
                _ => continue,
            };
            if !alive {
                continue;
            }
            self.drive(node, token)?;
            if self.nodes[node.index()].bad {
                if let NodeState::Or { alts, .. } = &mut self.nodes[id.index()].state {
                    alts[i].alive = false;
                }
            }
        }

        let (any_alive, any_done) = match &self.nodes[id.index()].state {
            NodeState::Or { alts, .. } => {
                let any_alive = alts.iter().any(|a| a.alive);
                let any_done = alts
                    .iter()
                    .any(|a| a.alive && self.nodes[a.node.index()].done);
                (any_alive, any_done)
            }
            _ => (false, false),
        };
        let node = &mut self.nodes[id.index()];
        if !any_alive {
            node.bad = true;
            node.done = false;
        } else {
            node.done = any_done;
        }
        Ok(())
    }

    fn drive_repeat(&mut self, id: NodeId, token: &Token) -> Result<(), LashError> {
        let grammar = Arc::clone(&self.grammar);
        let RuleBody::Repeat { item, .. } = &grammar.rule(self.nodes[id.index()].rule).body else {
            return Ok(());
        };
        let item = grammar.resolved(item);

        let current = match &self.nodes[id.index()].state {
            NodeState::Repeat { current, .. } => *current,
            _ => None,
        };
        let cur = match current {
            Some(c) => c,
            None => {
                let c = self.spawn(item, Some(id));
                if let NodeState::Repeat { current, .. } = &mut self.nodes[id.index()].state {
                    *current = Some(c);
                }
                c
            }
        };

        let wasdone = self.nodes[cur.index()].done;
        self.drive(cur, token)?;

        if self.nodes[cur.index()].bad {
            if wasdone {
                // Confirm the finished instance, then retry the token on a
                // fresh one.
                if let NodeState::Repeat {
                    done_text,
                    current_text,
                    ..
                } = &mut self.nodes[id.index()].state
                {
                    done_text.push_str(current_text);
                    current_text.clear();
                }
                let fresh = self.spawn(item, Some(id));
                if let NodeState::Repeat { current, .. } = &mut self.nodes[id.index()].state {
                    *current = Some(fresh);
                }
                self.drive(fresh, token)?;
                if self.nodes[fresh.index()].bad {
                    let node = &mut self.nodes[id.index()];
                    node.bad = true;
                    node.done = false;
                } else if self.nodes[fresh.index()].done {
                    let text = self.render(fresh);
                    if let NodeState::Repeat { current_text, .. } =
                        &mut self.nodes[id.index()].state
                    {
                        *current_text = text;
                    }
                    self.nodes[id.index()].done = true;
                } else {
                    self.nodes[id.index()].done = false;
                }
            } else {
                let node = &mut self.nodes[id.index()];
                node.bad = true;
                node.done = false;
            }
        } else if self.nodes[cur.index()].done {
            let text = self.render(cur);
            if let NodeState::Repeat { current_text, .. } = &mut self.nodes[id.index()].state {
                *current_text = text;
            }
            self.nodes[id.index()].done = true;
        } else {
            self.nodes[id.index()].done = false;
        }
        Ok(())
    }

    fn drive_action(&mut self, id: NodeId, token: &Token) -> Result<(), LashError> {
        let grammar = Arc::clone(&self.grammar);
        let RuleBody::Action { inner, .. } = &grammar.rule(self.nodes[id.index()].rule).body
        else {
            return Ok(());
        };
        let inner = grammar.resolved(inner);

        let inner_node = match &self.nodes[id.index()].state {
            NodeState::Action { inner: Some(n) } => *n,
            _ => {
                let n = self.spawn(inner, Some(id));
                if let NodeState::Action { inner } = &mut self.nodes[id.index()].state {
                    *inner = Some(n);
                }
                n
            }
        };

        self.drive(inner_node, token)?;
        let inner_bad = self.nodes[inner_node.index()].bad;
        let inner_done = self.nodes[inner_node.index()].done;
        {
            let node = &mut self.nodes[id.index()];
            node.bad = inner_bad;
            node.done = inner_done && !inner_bad;
        }
        if !inner_bad && inner_done {
            self.fire_hook(id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Computes the effects for an action whose inner rule just completed.
    /// Guards are evaluated immediately; everything else is queued for the
    /// session to apply once the token has been fully consumed.
    fn fire_hook(&mut self, id: NodeId) -> Result<(), LashError> {
        let grammar = Arc::clone(&self.grammar);
        let RuleBody::Action { hook, .. } = &grammar.rule(self.nodes[id.index()].rule).body
        else {
            return Ok(());
        };
        let hook = *hook;
        let inner = match &self.nodes[id.index()].state {
            NodeState::Action { inner: Some(n) } => *n,
            _ => return Ok(()),
        };

        match hook {
            Hook::PreBlock => {
                let text = self.render(inner);
                self.effects.push_back(Effect::Stash { key: id, text });
            }
            Hook::BlockStart => {
                let node = self.parent_of(id)?;
                self.effects.push_back(Effect::BlockStart { node });
            }
            Hook::CmdBlockStart => {
                let node = self.parent_of(id)?;
                self.effects.push_back(Effect::CmdBlockStart { node });
            }
            Hook::CmdEnd => {
                let text = self.render(inner);
                self.effects.push_back(Effect::Append(text));
            }
            Hook::ExpBlockEnd => {
                // The enclosing sequence's second item is the expression,
                // fully parsed by the time the closing brace fires this.
                let parent = self.parent_of(id)?;
                let text = match &self.nodes[parent.index()].state {
                    NodeState::Seq { slots, .. } if slots.len() > 1 => slots[1].text.clone(),
                    _ => {
                        return Err(LashError::Internal {
                            message: "expression block end outside a sequence".to_string(),
                        })
                    }
                };
                self.effects.push_back(Effect::ExpBlockEnd { text });
            }
            Hook::BlockLazyEnd => self.effects.push_back(Effect::BumpLazyEnds),
            Hook::CodeBlockEnd => self.effects.push_back(Effect::CodeBlockEnd),
            Hook::NoBlockEndSemi => self.effects.push_back(Effect::ClearAfterBlock),
            Hook::MarkIf => self.effects.push_back(Effect::MarkIf),
            Hook::StmtEnd => {
                let text = self.render(inner);
                self.effects.push_back(Effect::StmtEnd { text });
            }
            Hook::ElifCheck => {
                if !self.top().if_statement.unwrap_or(false) {
                    return Err(LashError::Guard {
                        message: "cannot 'elif' without a preceding 'if' or 'elif' statement"
                            .to_string(),
                    });
                }
            }
            Hook::ElseCheck => {
                if !self.top().if_statement.unwrap_or(false) {
                    return Err(LashError::Guard {
                        message: "cannot 'else' without a preceding 'if' or 'elif' statement"
                            .to_string(),
                    });
                }
            }
            Hook::SemiCheck => {
                if !self.top().after_block {
                    // A bare semicolon only closes a just-ended block; any
                    // other placement makes this alternative unviable.
                    let node = &mut self.nodes[id.index()];
                    node.bad = true;
                    node.done = false;
                }
            }
        }
        Ok(())
    }

    fn parent_of(&self, id: NodeId) -> Result<NodeId, LashError> {
        self.nodes[id.index()]
            .parent
            .ok_or_else(|| LashError::Internal {
                message: "hook fired on a parentless node".to_string(),
            })
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// The node's current text, per its rule's template.
    pub(crate) fn render(&self, id: NodeId) -> String {
        let node = &self.nodes[id.index()];
        match (&self.grammar.rule(node.rule).body, &node.state) {
            (RuleBody::Terminal { .. }, NodeState::Leaf { text })
            | (RuleBody::Value { .. }, NodeState::Leaf { text }) => {
                text.clone().unwrap_or_default()
            }
            (RuleBody::Seq { template, .. }, NodeState::Seq { slots, .. }) => match template {
                Some(t) => {
                    t.render(|pos| slots.get(pos).map(|s| s.text.clone()).unwrap_or_default())
                }
                None => slots.iter().map(|s| s.text.as_str()).collect(),
            },
            (RuleBody::Or { wrap, .. }, NodeState::Or { alts, .. }) => {
                // Earliest-declared surviving-and-done alternative wins.
                let pick = alts
                    .iter()
                    .find(|a| a.alive && self.nodes[a.node.index()].done)
                    .or_else(|| alts.iter().find(|a| a.alive));
                let inner = pick.map(|a| self.render(a.node)).unwrap_or_default();
                match wrap {
                    Some(t) => t.render(|_| inner.clone()),
                    None => inner,
                }
            }
            (
                RuleBody::Repeat { wrap, .. },
                NodeState::Repeat {
                    done_text,
                    current,
                    current_text,
                },
            ) => {
                let mut body = done_text.clone();
                if let Some(c) = current {
                    if self.nodes[c.index()].done {
                        body.push_str(current_text);
                    }
                }
                match wrap {
                    Some(t) => t.render(|_| body.clone()),
                    None => body,
                }
            }
            (RuleBody::Action { wrap, hook, .. }, NodeState::Action { inner }) => {
                let inner_text = inner.map(|n| self.render(n)).unwrap_or_default();
                match wrap {
                    Some(t) => t.render(|_| inner_text.clone()),
                    // Pre-block text is diverted to the context stash; it
                    // must not also surface through the parent's template.
                    None if *hook == Hook::PreBlock => String::new(),
                    None => inner_text,
                }
            }
            _ => String::new(),
        }
    }

    // ========================================================================
    // Forced completion
    // ========================================================================

    /// Seals a node as done and lets the done-ness ripple up the parent
    /// chain, capturing snapshots along the way. Stops at the first ancestor
    /// the completion does not finish. No hooks fire here; ancestors act on
    /// the sealed node when the next token arrives.
    pub(crate) fn force_done(&mut self, id: NodeId) {
        {
            let node = &mut self.nodes[id.index()];
            node.done = true;
            node.bad = false;
            node.sealed = true;
        }
        let grammar = Arc::clone(&self.grammar);
        let mut child = id;
        while let Some(parent) = self.nodes[child.index()].parent {
            let text = self.render(child);
            let advanced = match &grammar.rule(self.nodes[parent.index()].rule).body {
                RuleBody::Seq { items, .. } => {
                    let (pos, matches) = match &self.nodes[parent.index()].state {
                        NodeState::Seq { pos, slots, .. } => (
                            *pos,
                            slots.get(*pos).map(|s| s.node == child).unwrap_or(false),
                        ),
                        _ => (0, false),
                    };
                    if !matches {
                        false
                    } else {
                        let done = pos == items.len() - 1
                            || items[pos + 1..]
                                .iter()
                                .all(|r| grammar.is_zero_repeat(grammar.resolved(r)));
                        if let NodeState::Seq { slots, accum, .. } =
                            &mut self.nodes[parent.index()].state
                        {
                            slots[pos].text = text;
                            accum.clear();
                        }
                        if done {
                            self.nodes[parent.index()].done = true;
                        }
                        done
                    }
                }
                RuleBody::Or { .. } => {
                    let is_alive_alt = match &self.nodes[parent.index()].state {
                        NodeState::Or { alts, .. } => {
                            alts.iter().any(|a| a.alive && a.node == child)
                        }
                        _ => false,
                    };
                    if is_alive_alt {
                        self.nodes[parent.index()].done = true;
                    }
                    is_alive_alt
                }
                RuleBody::Repeat { .. } => {
                    let is_current = match &self.nodes[parent.index()].state {
                        NodeState::Repeat { current, .. } => *current == Some(child),
                        _ => false,
                    };
                    if is_current {
                        if let NodeState::Repeat { current_text, .. } =
                            &mut self.nodes[parent.index()].state
                        {
                            *current_text = text;
                        }
                        self.nodes[parent.index()].done = true;
                    }
                    is_current
                }
                RuleBody::Action { .. } => {
                    self.nodes[parent.index()].done = true;
                    true
                }
                _ => false,
            };
            if !advanced || !self.nodes[parent.index()].done {
                break;
            }
            child = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{GrammarBuilder, RepeatMin, Template};
    use crate::session::Session;
    use crate::token::TokenKind;

    fn session(build: impl FnOnce(&mut GrammarBuilder) -> RuleId) -> Session {
        let mut g = GrammarBuilder::new();
        let root = build(&mut g);
        Session::new(Arc::new(g.build().unwrap()), root)
    }

    fn feed_all(s: &mut Session, kinds: &[TokenKind]) {
        for k in kinds {
            s.feed(Token::bare(*k)).unwrap();
        }
    }

    #[test]
    fn terminal_renders_fixed_message() {
        let mut s = session(|g| {
            let plus = g.add(
                "plus",
                RuleBody::Terminal {
                    kind: TokenKind::Plus,
                    message: Some("+".to_string()),
                },
            );
            plus
        });
        s.feed(Token::bare(TokenKind::Plus)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "+");
    }

    #[test]
    fn value_renders_captured_text() {
        let mut s = session(|g| g.value("int", TokenKind::Int));
        s.feed(Token::with_text(TokenKind::Int, "42")).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "42");
    }

    #[test]
    fn leaf_rejects_wrong_kind() {
        let mut s = session(|g| g.value("int", TokenKind::Int));
        let err = s.feed(Token::bare(TokenKind::Semi)).unwrap_err();
        assert!(matches!(err, LashError::Rejected { .. }));
    }

    #[test]
    fn sequence_walks_items_in_order() {
        let mut s = session(|g| {
            let int = g.value("int", TokenKind::Int);
            let semi = g.terminal("semi", TokenKind::Semi);
            g.seq(
                "stmt",
                vec![int.into(), semi.into()],
                Some(Template::new("%s;", &[0])),
            )
        });
        s.feed(Token::with_text(TokenKind::Int, "7")).unwrap();
        assert!(!s.root_is_done());
        s.feed(Token::bare(TokenKind::Semi)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "7;");
    }

    #[test]
    fn sequence_force_advances_past_done_star() {
        // ws* then int: the int token bounces off the star and lands on
        // the next item carrying no residue.
        let mut s = session(|g| {
            let ws = g.terminal("ws", TokenKind::Ws);
            let star = g.star("w", ws.into(), None);
            let int = g.value("int", TokenKind::Int);
            g.seq(
                "padded",
                vec![star.into(), int.into()],
                Some(Template::new("%s", &[1])),
            )
        });
        feed_all(&mut s, &[TokenKind::Ws, TokenKind::Ws]);
        assert!(!s.root_is_done());
        s.feed(Token::with_text(TokenKind::Int, "3")).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "3");
    }

    #[test]
    fn sequence_replays_backlog_after_failed_extension() {
        // First item: either one int or three ints. Feeding INT INT SEMI
        // makes the three-int branch fail at the semicolon; the second int
        // consumed during the attempt must be replayed into the tail.
        let mut s = session(|g| {
            let int1 = g.value("int1", TokenKind::Int);
            let int2 = g.value("int2", TokenKind::Int);
            let int3 = g.value("int3", TokenKind::Int);
            let triple = g.seq(
                "triple",
                vec![int1.into(), int2.into(), int3.into()],
                Some(Template::new("(%s %s %s)", &[0, 1, 2])),
            );
            let single = g.value("single", TokenKind::Int);
            let head = g.alt("head", vec![single.into(), triple.into()], None);
            let tail = g.value("tail", TokenKind::Int);
            let semi = g.terminal("semi", TokenKind::Semi);
            g.seq(
                "pair",
                vec![head.into(), tail.into(), semi.into()],
                Some(Template::new("%s %s", &[0, 1])),
            )
        });
        s.feed(Token::with_text(TokenKind::Int, "1")).unwrap();
        s.feed(Token::with_text(TokenKind::Int, "2")).unwrap();
        s.feed(Token::bare(TokenKind::Semi)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "1 2");
    }

    #[test]
    fn alternation_prefers_first_declared() {
        let mut s = session(|g| {
            let a = g.add(
                "as_a",
                RuleBody::Terminal {
                    kind: TokenKind::Id,
                    message: Some("a".to_string()),
                },
            );
            let b = g.add(
                "as_b",
                RuleBody::Terminal {
                    kind: TokenKind::Id,
                    message: Some("b".to_string()),
                },
            );
            g.alt("either", vec![a.into(), b.into()], None)
        });
        s.feed(Token::with_text(TokenKind::Id, "x")).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "a");
    }

    #[test]
    fn alternation_discards_dead_branch_rendering() {
        // A done alternative that later dies must not leave its text behind.
        let mut s = session(|g| {
            let int = g.value("int", TokenKind::Int);
            let semi = g.terminal("semi", TokenKind::Semi);
            let long = g.seq(
                "long",
                vec![int.into(), semi.into()],
                Some(Template::new("long(%s)", &[0])),
            );
            let short = g.value("short", TokenKind::Int);
            g.alt("either", vec![long.into(), short.into()], None)
        });
        s.feed(Token::with_text(TokenKind::Int, "5")).unwrap();
        s.feed(Token::bare(TokenKind::Semi)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "long(5)");
    }

    #[test]
    fn star_is_done_before_any_input() {
        let s = session(|g| {
            let ws = g.terminal("ws", TokenKind::Ws);
            g.star("w", ws.into(), None)
        });
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "");
    }

    #[test]
    fn plus_requires_one_instance() {
        let mut s = session(|g| {
            let int = g.value("int", TokenKind::Int);
            g.add(
                "ints",
                RuleBody::Repeat {
                    item: int.into(),
                    min: RepeatMin::One,
                    wrap: None,
                },
            )
        });
        assert!(!s.root_is_done());
        s.feed(Token::with_text(TokenKind::Int, "1")).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "1");
    }

    #[test]
    fn repeat_confirms_instances_one_at_a_time() {
        // Each instance is int+semi; three instances concatenate.
        let mut s = session(|g| {
            let int = g.value("int", TokenKind::Int);
            let semi = g.terminal("semi", TokenKind::Semi);
            let item = g.seq(
                "item",
                vec![int.into(), semi.into()],
                Some(Template::new("%s;", &[0])),
            );
            g.star("items", item.into(), None)
        });
        for n in ["1", "2", "3"] {
            s.feed(Token::with_text(TokenKind::Int, n)).unwrap();
            s.feed(Token::bare(TokenKind::Semi)).unwrap();
        }
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "1;2;3;");
    }

    #[test]
    fn repeat_dies_when_fresh_instance_rejects() {
        let mut s = session(|g| {
            let int = g.value("int", TokenKind::Int);
            let ints = g.star("ints", int.into(), None);
            let semi = g.terminal("semi", TokenKind::Semi);
            g.seq(
                "line",
                vec![ints.into(), semi.into()],
                Some(Template::new("%s;", &[0])),
            )
        });
        s.feed(Token::with_text(TokenKind::Int, "1")).unwrap();
        s.feed(Token::with_text(TokenKind::Int, "2")).unwrap();
        s.feed(Token::bare(TokenKind::Semi)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "12;");
    }

    #[test]
    fn early_done_sequence_stays_done_while_star_extends() {
        // int then ws*: done after the int, still done mid-extension.
        let mut s = session(|g| {
            let int = g.value("int", TokenKind::Int);
            let ws = g.terminal("ws", TokenKind::Ws);
            let pad = g.star("pad", ws.into(), None);
            g.seq(
                "line",
                vec![int.into(), pad.into()],
                Some(Template::new("%s", &[0])),
            )
        });
        s.feed(Token::with_text(TokenKind::Int, "9")).unwrap();
        assert!(s.root_is_done());
        s.feed(Token::bare(TokenKind::Ws)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "9");
    }

    #[test]
    fn snapshot_survives_failed_extension() {
        // Or of [int] vs [int ws int]; after INT WS SEMI the long branch is
        // dead and the rendering must come from the confirmed short branch.
        let mut s = session(|g| {
            let int_a = g.value("int_a", TokenKind::Int);
            let short = g.seq("short", vec![int_a.into()], Some(Template::new("v=%s", &[0])));
            let int_b = g.value("int_b", TokenKind::Int);
            let ws = g.terminal("ws", TokenKind::Ws);
            let int_c = g.value("int_c", TokenKind::Int);
            let long = g.seq(
                "long",
                vec![int_b.into(), ws.into(), int_c.into()],
                Some(Template::new("pair(%s,%s)", &[0, 2])),
            );
            let head = g.alt("head", vec![short.into(), long.into()], None);
            let pad_ws = g.terminal("pad_ws", TokenKind::Ws);
            let pad = g.star("pad", pad_ws.into(), None);
            let semi = g.terminal("semi", TokenKind::Semi);
            g.seq(
                "line",
                vec![head.into(), pad.into(), semi.into()],
                Some(Template::new("%s;", &[0])),
            )
        });
        s.feed(Token::with_text(TokenKind::Int, "8")).unwrap();
        s.feed(Token::bare(TokenKind::Ws)).unwrap();
        s.feed(Token::bare(TokenKind::Semi)).unwrap();
        assert!(s.root_is_done());
        assert_eq!(s.root_render(), "v=8;");
    }
}
