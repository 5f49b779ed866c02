//! Rule descriptions and the two-phase grammar builder.
//!
//! A grammar is an arena of rules indexed by `RuleId`. Rules reference each
//! other by id; mutually recursive rules use a named forward reference that
//! the builder resolves in a final scan pass. The resolved `Grammar` is
//! immutable and can be shared read-only by any number of parse sessions.

use crate::diagnostics::LashError;
use crate::token::TokenKind;

// ============================================================================
// IDS AND REFERENCES
// ============================================================================

/// Index of a rule within its grammar's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A reference to another rule: either a direct id, or a by-name forward
/// reference to a rule that has not been declared yet.
#[derive(Debug, Clone)]
pub enum RuleRef {
    Id(RuleId),
    Forward(String),
}

impl From<RuleId> for RuleRef {
    fn from(id: RuleId) -> Self {
        RuleRef::Id(id)
    }
}

/// Shorthand for a forward reference.
pub fn forward(name: &str) -> RuleRef {
    RuleRef::Forward(name.to_string())
}

// ============================================================================
// TEMPLATES
// ============================================================================

/// An output template: literal chunks around `%s` slots, plus the child
/// position each slot pulls from. Children at positions no slot names render
/// silently; naming the same position twice is a construction defect.
#[derive(Debug, Clone)]
pub struct Template {
    chunks: Vec<String>,
    slots: Vec<usize>,
}

impl Template {
    /// Builds a template from a `%s` format string and its slot positions.
    pub fn new(format: &str, slots: &[usize]) -> Template {
        Template {
            chunks: format.split("%s").map(str::to_string).collect(),
            slots: slots.to_vec(),
        }
    }

    /// A single-slot wrapper around one child, e.g. `"(exp %s)"`.
    pub fn wrap(format: &str) -> Template {
        let chunks: Vec<String> = format.split("%s").map(str::to_string).collect();
        let slots = vec![0; chunks.len().saturating_sub(1)];
        Template { chunks, slots }
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Renders with `lookup` supplying the text for each named position.
    pub fn render(&self, lookup: impl Fn(usize) -> String) -> String {
        let mut out = String::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            out.push_str(chunk);
            if let Some(&pos) = self.slots.get(i) {
                out.push_str(&lookup(pos));
            }
        }
        out
    }

    fn arity_ok(&self) -> bool {
        self.chunks.len() == self.slots.len() + 1
    }
}

// ============================================================================
// RULE BODIES
// ============================================================================

/// Minimum instance count for a repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMin {
    Zero,
    One,
}

/// Side effects a rule can request when its wrapped rule completes. Hooks
/// compute explicit effect values; the session driver applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Stash the completed text; the next block start (or statement end)
    /// flushes it to the output buffer.
    PreBlock,
    /// Open a code block: flush stashed text, push a context, emit `{`.
    BlockStart,
    /// Open a command block: push a context, emit `[{`.
    CmdBlockStart,
    /// A command line finished: emit its text.
    CmdEnd,
    /// The closing brace of an expression block: emit the expression and `}`,
    /// pop the block context.
    ExpBlockEnd,
    /// A statement ended at a closing brace; defer the block close until the
    /// statement itself is emitted.
    BlockLazyEnd,
    /// Close a code block: emit `}`, pop, complete the block's parser.
    CodeBlockEnd,
    /// Something other than a block end happened; a following bare semicolon
    /// is no longer acceptable.
    NoBlockEndSemi,
    /// A statement finished: flush stashed text, emit the statement, settle
    /// any deferred block close.
    StmtEnd,
    /// The finished statement was an `if` or `elif`; the enclosing context
    /// records it so `elif`/`else` guards can check for it.
    MarkIf,
    /// Guard: `elif` requires a preceding `if` or `elif` statement.
    ElifCheck,
    /// Guard: `else` requires a preceding `if` or `elif` statement.
    ElseCheck,
    /// Guard: a bare semicolon is only allowed right after a block end.
    SemiCheck,
}

/// The shape of a rule.
#[derive(Debug, Clone)]
pub enum RuleBody {
    /// Matches one token of `kind`. Renders `message` if given, otherwise the
    /// token's surface text.
    Terminal {
        kind: TokenKind,
        message: Option<String>,
    },
    /// Matches one token of `kind` and renders its captured text.
    Value { kind: TokenKind },
    /// Matches `items` in order. Renders through `template`, or concatenates
    /// the item texts when there is none.
    Seq {
        items: Vec<RuleRef>,
        template: Option<Template>,
    },
    /// Matches whichever alternative survives; earliest-declared wins ties.
    Or {
        alts: Vec<RuleRef>,
        wrap: Option<Template>,
    },
    /// Matches `item` zero-or-more or one-or-more times.
    Repeat {
        item: RuleRef,
        min: RepeatMin,
        wrap: Option<Template>,
    },
    /// Transparent wrapper that fires `hook` whenever `inner` completes on a
    /// consumed token. Renders `wrap` if given, the inner text otherwise.
    Action {
        inner: RuleRef,
        hook: Hook,
        wrap: Option<Template>,
    },
}

/// A named rule in the arena.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub body: RuleBody,
}

// ============================================================================
// RESOLVED GRAMMAR
// ============================================================================

/// A fully resolved grammar: every `RuleRef` is an id.
#[derive(Debug)]
pub struct Grammar {
    rules: Vec<Rule>,
}

impl Grammar {
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Looks up a rule by name. Intended for tests and tooling; parsing
    /// itself only ever follows ids.
    pub fn rule_named(&self, name: &str) -> Option<RuleId> {
        self.rules
            .iter()
            .position(|r| r.name == name)
            .map(|i| RuleId(i as u32))
    }

    pub(crate) fn resolved(&self, r: &RuleRef) -> RuleId {
        match r {
            RuleRef::Id(id) => *id,
            // build() guarantees no forwards survive resolution
            RuleRef::Forward(_) => unreachable!("unresolved forward in built grammar"),
        }
    }

    /// Whether a freshly created parser for this rule starts out done, i.e.
    /// would accept matching zero tokens.
    pub(crate) fn init_done(&self, id: RuleId) -> bool {
        self.init_done_inner(id, &mut Vec::new())
    }

    fn init_done_inner(&self, id: RuleId, visiting: &mut Vec<RuleId>) -> bool {
        if visiting.contains(&id) {
            return false;
        }
        visiting.push(id);
        let done = match &self.rule(id).body {
            RuleBody::Terminal { .. } | RuleBody::Value { .. } => false,
            RuleBody::Seq { .. } => false,
            RuleBody::Repeat { min, .. } => *min == RepeatMin::Zero,
            RuleBody::Or { alts, .. } => alts
                .iter()
                .any(|a| self.init_done_inner(self.resolved(a), visiting)),
            RuleBody::Action { inner, .. } => self.init_done_inner(self.resolved(inner), visiting),
        };
        visiting.pop();
        done
    }

    /// Whether this rule is a zero-minimum repetition. Sequences complete
    /// early when every remaining item satisfies this.
    pub(crate) fn is_zero_repeat(&self, id: RuleId) -> bool {
        matches!(
            self.rule(id).body,
            RuleBody::Repeat {
                min: RepeatMin::Zero,
                ..
            }
        )
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Accumulates rules, then resolves forward references and validates
/// templates in `build`.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    rules: Vec<Rule>,
}

impl GrammarBuilder {
    pub fn new() -> GrammarBuilder {
        GrammarBuilder::default()
    }

    pub fn add(&mut self, name: &str, body: RuleBody) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(Rule {
            name: name.to_string(),
            body,
        });
        id
    }

    // Convenience constructors, shaped after the grammar's own vocabulary.

    pub fn terminal(&mut self, name: &str, kind: TokenKind) -> RuleId {
        self.add(
            name,
            RuleBody::Terminal {
                kind,
                message: None,
            },
        )
    }

    pub fn keyword(&mut self, name: &str, kind: TokenKind, message: &str) -> RuleId {
        self.add(
            name,
            RuleBody::Terminal {
                kind,
                message: Some(message.to_string()),
            },
        )
    }

    pub fn value(&mut self, name: &str, kind: TokenKind) -> RuleId {
        self.add(name, RuleBody::Value { kind })
    }

    pub fn seq(
        &mut self,
        name: &str,
        items: Vec<RuleRef>,
        template: Option<Template>,
    ) -> RuleId {
        self.add(name, RuleBody::Seq { items, template })
    }

    pub fn alt(&mut self, name: &str, alts: Vec<RuleRef>, wrap: Option<Template>) -> RuleId {
        self.add(name, RuleBody::Or { alts, wrap })
    }

    pub fn star(&mut self, name: &str, item: RuleRef, wrap: Option<Template>) -> RuleId {
        self.add(
            name,
            RuleBody::Repeat {
                item,
                min: RepeatMin::Zero,
                wrap,
            },
        )
    }

    pub fn plus(&mut self, name: &str, item: RuleRef, wrap: Option<Template>) -> RuleId {
        self.add(
            name,
            RuleBody::Repeat {
                item,
                min: RepeatMin::One,
                wrap,
            },
        )
    }

    pub fn action(&mut self, name: &str, inner: RuleRef, hook: Hook) -> RuleId {
        self.add(
            name,
            RuleBody::Action {
                inner,
                hook,
                wrap: None,
            },
        )
    }

    pub fn action_with(
        &mut self,
        name: &str,
        inner: RuleRef,
        hook: Hook,
        wrap: Template,
    ) -> RuleId {
        self.add(
            name,
            RuleBody::Action {
                inner,
                hook,
                wrap: Some(wrap),
            },
        )
    }

    /// Resolves every forward reference and validates templates. Fails with
    /// a construction error if a forward names zero or several rules, or a
    /// template is malformed.
    pub fn build(self) -> Result<Grammar, LashError> {
        let mut rules = self.rules;

        // Name table for forward resolution. Only names actually targeted by
        // a forward need to be unambiguous.
        let resolve = |name: &str, rules: &[Rule]| -> Result<RuleId, LashError> {
            let mut found = None;
            for (i, r) in rules.iter().enumerate() {
                if r.name == name {
                    if found.is_some() {
                        return Err(construction(format!(
                            "forward reference '{name}' matches more than one rule"
                        )));
                    }
                    found = Some(RuleId(i as u32));
                }
            }
            found.ok_or_else(|| {
                construction(format!("forward reference '{name}' matches no rule"))
            })
        };

        let snapshot = rules.clone();
        for rule in &mut rules {
            let refs: Vec<&mut RuleRef> = match &mut rule.body {
                RuleBody::Terminal { .. } | RuleBody::Value { .. } => vec![],
                RuleBody::Seq { items, .. } => items.iter_mut().collect(),
                RuleBody::Or { alts, .. } => alts.iter_mut().collect(),
                RuleBody::Repeat { item, .. } => vec![item],
                RuleBody::Action { inner, .. } => vec![inner],
            };
            for r in refs {
                if let RuleRef::Forward(name) = r {
                    *r = RuleRef::Id(resolve(name, &snapshot)?);
                }
            }
        }

        for rule in &rules {
            validate_rule(rule)?;
        }

        Ok(Grammar { rules })
    }
}

fn construction(message: String) -> LashError {
    LashError::Construction { message }
}

fn validate_rule(rule: &Rule) -> Result<(), LashError> {
    match &rule.body {
        RuleBody::Seq { items, template } => {
            if let Some(t) = template {
                if !t.arity_ok() {
                    return Err(construction(format!(
                        "rule '{}': template slot count does not match its %s count",
                        rule.name
                    )));
                }
                let mut seen = Vec::new();
                for &pos in t.slots() {
                    if pos >= items.len() {
                        return Err(construction(format!(
                            "rule '{}': template slot {} is out of range",
                            rule.name, pos
                        )));
                    }
                    if seen.contains(&pos) {
                        return Err(construction(format!(
                            "rule '{}': template names position {} twice",
                            rule.name, pos
                        )));
                    }
                    seen.push(pos);
                }
            }
            Ok(())
        }
        RuleBody::Or { wrap, .. } | RuleBody::Repeat { wrap, .. } => {
            validate_wrap(rule, wrap.as_ref())
        }
        RuleBody::Action { wrap, .. } => validate_wrap(rule, wrap.as_ref()),
        _ => Ok(()),
    }
}

fn validate_wrap(rule: &Rule, wrap: Option<&Template>) -> Result<(), LashError> {
    if let Some(t) = wrap {
        if !t.arity_ok() || t.slot_count() > 1 || t.slots().iter().any(|&s| s != 0) {
            return Err(construction(format!(
                "rule '{}': wrapper template must have at most one %s slot",
                rule.name
            )));
        }
    }
    Ok(())
}
