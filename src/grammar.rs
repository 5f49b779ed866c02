//! The lash language grammar.
//!
//! Rule names and output templates follow the language's s-expression AST
//! conventions: every statement renders as `(head ...);` and expressions as
//! `(exp ...)`. The grammar is built once into a shared static; sessions
//! borrow it read-only. There are two roots: `script` parses statement lines
//! and `shell` parses command lines, where a line is a program invocation, a
//! command block, or blank.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::diagnostics::LashError;
use crate::rules::{forward, Grammar, GrammarBuilder, Hook, RuleId, Template};
use crate::token::TokenKind;

/// The built grammar plus its entry points.
pub struct LanguageGrammar {
    pub grammar: Arc<Grammar>,
    /// Command-line mode root.
    pub shell: RuleId,
    /// Statement mode root.
    pub script: RuleId,
}

static LANGUAGE: Lazy<LanguageGrammar> = Lazy::new(|| {
    // A failure here is a defect in the rule definitions below, not a
    // runtime condition.
    build_language().expect("language grammar failed to build")
});

/// The shared language grammar.
pub fn language() -> &'static LanguageGrammar {
    &LANGUAGE
}

fn tpl(format: &str, slots: &[usize]) -> Option<Template> {
    Some(Template::new(format, slots))
}

/// Builds the full grammar from scratch. Public so the grammar checker can
/// surface construction diagnostics instead of panicking.
pub fn build_language() -> Result<LanguageGrammar, LashError> {
    use TokenKind::*;

    let mut g = GrammarBuilder::new();

    // ------------------------------------------------------------------
    // Layout terminals. Whitespace renders as nothing; templates insert
    // every space that appears in the output.
    // ------------------------------------------------------------------
    let t_ws = g.keyword("WS", Ws, "");
    let t_newl = g.keyword("NEWL", Newl, "");
    let t_semi = g.keyword("SEMI", Semi, "");

    let w = g.star("w", t_ws.into(), None);
    let ws = g.plus("ws", t_ws.into(), None);
    let wn = g.seq("wn", vec![w.into(), t_newl.into()], None);
    let newls = g.star("newls", t_newl.into(), None);
    let blank = g.seq("blank", vec![w.into(), newls.into()], None);
    let n = g.star("n", blank.into(), None);

    // ------------------------------------------------------------------
    // Statement terminators. A statement ends at a newline, a semicolon,
    // or lazily at the closing brace of its enclosing block.
    // ------------------------------------------------------------------
    let endsemi = g.seq("endsemi", vec![w.into(), t_semi.into()], None);
    let end = g.alt("end", vec![wn.into(), endsemi.into()], None);
    let t_rbrace = g.keyword("RBRACE", Rbrace, "");
    let endbrace = g.seq("endbrace", vec![w.into(), t_rbrace.into()], None);
    let endlazy = g.action("endlazy", endbrace.into(), Hook::BlockLazyEnd);
    let endl = g.alt("endl", vec![end.into(), endlazy.into()], None);
    let cmdendbrace = g.seq(
        "cmdendbrace",
        vec![w.into(), t_rbrace.into(), end.into()],
        None,
    );
    let cmdendlazy = g.action("cmdendlazy", cmdendbrace.into(), Hook::BlockLazyEnd);
    let cmdstmtendl = g.alt("cmdstmtendl", vec![end.into(), cmdendlazy.into()], None);

    // ------------------------------------------------------------------
    // Variables and property access.
    // ------------------------------------------------------------------
    let t_id = g.value("ID", Id);
    let t_dot = g.terminal("DOT", Dot);
    let prop = g.seq(
        "prop",
        vec![w.into(), t_dot.into(), n.into(), t_id.into()],
        tpl(".%s", &[3]),
    );
    let props = g.star("props", prop.into(), None);
    let var = g.seq(
        "var",
        vec![t_id.into(), props.into()],
        tpl("(var %s%s)", &[0, 1]),
    );

    // ------------------------------------------------------------------
    // Literals and paths.
    // ------------------------------------------------------------------
    let t_int = g.value("INT", Int);
    let t_fixed = g.value("FIXED", Fixed);
    let t_str = g.value("STR", Str);
    let t_regexp = g.value("REGEXP", Regexp);
    let t_label = g.value("LABEL", Label);
    let literal = g.alt(
        "literal",
        vec![
            t_int.into(),
            t_fixed.into(),
            t_str.into(),
            t_regexp.into(),
            t_label.into(),
        ],
        None,
    );

    let t_slash = g.terminal("SLASH", Slash);
    let t_tilde_path = g.terminal("TILDE_PATH", Tilde);
    let dotslash = g.seq("dotslash", vec![t_dot.into(), t_slash.into()], None);
    let dotdotslash = g.seq(
        "dotdotslash",
        vec![t_dot.into(), t_dot.into(), t_slash.into()],
        None,
    );
    let tildeslash = g.seq(
        "tildeslash",
        vec![t_tilde_path.into(), t_slash.into()],
        None,
    );
    let pathstart = g.alt(
        "pathstart",
        vec![
            t_slash.into(),
            dotslash.into(),
            dotdotslash.into(),
            tildeslash.into(),
        ],
        None,
    );
    let pathpiece = g.alt(
        "pathpiece",
        vec![t_id.into(), t_slash.into(), t_dot.into()],
        None,
    );
    let pathrest = g.star("pathrest", pathpiece.into(), None);
    let path = g.seq(
        "path",
        vec![pathstart.into(), pathrest.into()],
        tpl("(path %s%s)", &[0, 1]),
    );

    // ------------------------------------------------------------------
    // Operators. Each terminal renders its surface lexeme.
    // ------------------------------------------------------------------
    let t_userop = g.value("USEROP", Userop);
    let binop_kinds = [
        Plus, Minus, Star, Slash, Percent, Caret, Pipe, Amp, Tilde, Doubletilde, Lt, Le, Gt, Ge,
        Eq, Ne, And, Or, Xor, Xnor, Nor,
    ];
    let mut binop_alts: Vec<crate::rules::RuleRef> = binop_kinds
        .iter()
        .map(|&k| g.terminal(k.wire_name(), k).into())
        .collect();
    binop_alts.push(t_userop.into());
    let binop = g.alt("binop", binop_alts, None);

    let assignop_kinds = [
        Equals,
        PlusEquals,
        MinusEquals,
        StarEquals,
        SlashEquals,
        PercentEquals,
        CaretEquals,
        PipeEquals,
        AmpEquals,
        TildeEquals,
    ];
    let assignop_alts: Vec<crate::rules::RuleRef> = assignop_kinds
        .iter()
        .map(|&k| g.terminal(k.wire_name(), k).into())
        .collect();
    let assignop = g.alt("assignop", assignop_alts, None);

    let t_minus = g.terminal("MINUS_PREFIX", Minus);

    // ------------------------------------------------------------------
    // Composite atoms. Lists and parens recurse into expressions via
    // forward references.
    // ------------------------------------------------------------------
    let t_lbracket = g.keyword("LBRACKET", Lbracket, "");
    let t_rbracket = g.keyword("RBRACKET", Rbracket, "");
    let t_lparen = g.keyword("LPAREN", Lparen, "");
    let t_rparen = g.keyword("RPAREN", Rparen, "");
    let list = g.seq(
        "list",
        vec![
            t_lbracket.into(),
            n.into(),
            forward("explist"),
            n.into(),
            t_rbracket.into(),
        ],
        tpl("(list %s)", &[2]),
    );
    let parens = g.seq(
        "parens",
        vec![
            t_lparen.into(),
            n.into(),
            forward("subexp"),
            n.into(),
            t_rparen.into(),
        ],
        tpl("(paren %s)", &[2]),
    );

    // Function literals: `@name { ... }`. The signature is stashed and
    // flushed when the block opens, like an if-statement's head.
    let t_at = g.keyword("AT", At, "");
    let signature = g.seq(
        "signature",
        vec![t_at.into(), w.into(), t_id.into()],
        tpl("@%s", &[2]),
    );
    let funcsig = g.seq(
        "funcsig",
        vec![signature.into(), w.into()],
        tpl("(func %s ", &[0]),
    );
    let prefunc = g.action("prefunc", funcsig.into(), Hook::PreBlock);
    let function = g.seq(
        "function",
        vec![prefunc.into(), forward("codeblock")],
        tpl("%s);", &[1]),
    );

    let atom = g.alt(
        "atom",
        vec![
            var.into(),
            literal.into(),
            path.into(),
            list.into(),
            parens.into(),
        ],
        None,
    );

    // ------------------------------------------------------------------
    // Expressions.
    // ------------------------------------------------------------------
    let prefixexp = g.seq(
        "prefixexp",
        vec![t_minus.into(), n.into(), forward("subexp")],
        tpl("(%s %s)", &[0, 2]),
    );
    let binopexp = g.seq(
        "binopexp",
        vec![
            atom.into(),
            w.into(),
            binop.into(),
            n.into(),
            forward("subexp"),
        ],
        tpl("(%s %s %s)", &[2, 0, 4]),
    );
    let prefixbinopexp = g.seq(
        "prefixbinopexp",
        vec![
            t_minus.into(),
            n.into(),
            atom.into(),
            w.into(),
            binop.into(),
            n.into(),
            forward("subexp"),
        ],
        tpl("(%s (%s %s) %s)", &[4, 0, 2, 6]),
    );
    let exp_alts = vec![
        atom.into(),
        prefixexp.into(),
        binopexp.into(),
        prefixbinopexp.into(),
    ];
    // Reached only through its forward references.
    g.alt("subexp", exp_alts.clone(), None);
    let exp = g.alt("exp", exp_alts.clone(), Some(Template::wrap("(exp %s)")));
    let typeexp = g.alt("type", exp_alts, Some(Template::wrap("(type %s)")));

    let t_comma = g.keyword("COMMA", Comma, "");
    let expcomma = g.seq(
        "expcomma",
        vec![w.into(), t_comma.into(), n.into(), exp.into()],
        tpl(" %s", &[3]),
    );
    let expcommas = g.star("expcommas", expcomma.into(), None);
    let explist = g.seq(
        "explist",
        vec![exp.into(), expcommas.into()],
        tpl("%s%s", &[0, 1]),
    );

    // ------------------------------------------------------------------
    // Declarations: new / renew / del / isvar.
    // ------------------------------------------------------------------
    let t_equals_init = g.keyword("EQUALS_INIT", Equals, "");
    let t_colon = g.keyword("COLON", Colon, "");
    let assign1 = g.seq(
        "assign1",
        vec![
            t_id.into(),
            w.into(),
            t_equals_init.into(),
            n.into(),
            exp.into(),
        ],
        tpl("%s %s", &[0, 4]),
    );
    let assign2 = g.seq(
        "assign2",
        vec![
            t_id.into(),
            w.into(),
            t_colon.into(),
            n.into(),
            typeexp.into(),
            w.into(),
            t_equals_init.into(),
            n.into(),
            exp.into(),
        ],
        tpl("%s %s %s", &[0, 4, 8]),
    );
    let newassign = g.alt(
        "newassign",
        vec![t_id.into(), assign1.into(), assign2.into()],
        Some(Template::wrap("(init %s)")),
    );
    let commanew = g.seq(
        "commanew",
        vec![w.into(), t_comma.into(), n.into(), newassign.into()],
        tpl(" %s", &[3]),
    );
    let news = g.star("news", commanew.into(), None);

    let t_new = g.keyword("NEW", New, "");
    let t_renew = g.keyword("RENEW", Renew, "");
    let t_del = g.keyword("DEL", Del, "");
    let t_isvar = g.keyword("ISVAR", Isvar, "");
    let stmtnew = g.seq(
        "stmtnew",
        vec![t_new.into(), n.into(), newassign.into(), news.into()],
        tpl("(new %s%s);", &[2, 3]),
    );
    let stmtrenew = g.seq(
        "stmtrenew",
        vec![t_renew.into(), n.into(), newassign.into(), news.into()],
        tpl("(renew %s%s);", &[2, 3]),
    );
    let commavar = g.seq(
        "commavar",
        vec![w.into(), t_comma.into(), n.into(), var.into()],
        tpl(" %s", &[3]),
    );
    let commavars = g.star("commavars", commavar.into(), None);
    let stmtdel = g.seq(
        "stmtdel",
        vec![t_del.into(), n.into(), var.into(), commavars.into()],
        tpl("(del %s%s);", &[2, 3]),
    );
    let stmtisvar = g.seq(
        "stmtisvar",
        vec![t_isvar.into(), n.into(), var.into(), commavars.into()],
        tpl("(isvar %s%s);", &[2, 3]),
    );

    // ------------------------------------------------------------------
    // Assignment and procedure calls.
    // ------------------------------------------------------------------
    let stmtassign = g.seq(
        "stmtassign",
        vec![
            var.into(),
            w.into(),
            assignop.into(),
            n.into(),
            exp.into(),
        ],
        tpl("(%s %s %s);", &[2, 0, 4]),
    );

    let proccallargs = g.seq(
        "proccallargs",
        vec![
            var.into(),
            w.into(),
            t_lparen.into(),
            n.into(),
            explist.into(),
            n.into(),
            t_rparen.into(),
        ],
        tpl("%s %s", &[0, 4]),
    );
    let proccallvoid = g.seq(
        "proccallvoid",
        vec![
            var.into(),
            w.into(),
            t_lparen.into(),
            n.into(),
            t_rparen.into(),
        ],
        tpl("%s", &[0]),
    );
    let stmtproccall = g.alt(
        "stmtproccall",
        vec![proccallargs.into(), proccallvoid.into()],
        Some(Template::wrap("(call %s);")),
    );

    // ------------------------------------------------------------------
    // Branching. The statement head up to the opening brace is stashed by
    // a pre-block action and flushed when the block context is pushed; the
    // statement itself renders only its closing `);`.
    // ------------------------------------------------------------------
    let t_if = g.keyword("IF", If, "");
    let t_elif = g.terminal("ELIF", Elif);
    let t_else = g.terminal("ELSE", Else);

    let ifstart = g.seq(
        "ifstart",
        vec![t_if.into(), n.into(), exp.into()],
        tpl("(if %s ", &[2]),
    );
    let preif = g.action("preif", ifstart.into(), Hook::PreBlock);
    let ifline = g.seq(
        "ifline",
        vec![t_comma.into(), w.into(), forward("stmt")],
        tpl("%s", &[2]),
    );
    let ifblock = g.seq(
        "ifblock",
        vec![n.into(), forward("codeblock")],
        tpl("%s", &[1]),
    );
    let ifpred = g.alt("ifpred", vec![ifline.into(), ifblock.into()], None);
    let stmtif_inner = g.seq(
        "stmtif_inner",
        vec![preif.into(), ifpred.into()],
        tpl("%s);", &[1]),
    );
    let stmtif = g.action("stmtif", stmtif_inner.into(), Hook::MarkIf);

    let elifcheck = g.action("elifcheck", t_elif.into(), Hook::ElifCheck);
    let elifstart = g.seq(
        "elifstart",
        vec![elifcheck.into(), n.into(), exp.into()],
        tpl("(elif %s ", &[2]),
    );
    let preelif = g.action("preelif", elifstart.into(), Hook::PreBlock);
    let stmtelif_inner = g.seq(
        "stmtelif_inner",
        vec![preelif.into(), ifpred.into()],
        tpl("%s);", &[1]),
    );
    let stmtelif = g.action("stmtelif", stmtelif_inner.into(), Hook::MarkIf);

    let elsecheck = g.action_with(
        "elsecheck",
        t_else.into(),
        Hook::ElseCheck,
        Template::new("(else ", &[]),
    );
    let preelse = g.action("preelse", elsecheck.into(), Hook::PreBlock);
    let stmtelse = g.seq(
        "stmtelse",
        vec![preelse.into(), ifpred.into()],
        tpl("%s);", &[1]),
    );

    // ------------------------------------------------------------------
    // Control flow statements.
    // ------------------------------------------------------------------
    let t_break = g.terminal("BREAK", Break);
    let t_continue = g.terminal("CONTINUE", Continue);
    let t_return = g.terminal("RETURN", Return);
    let t_yield = g.terminal("YIELD", Yield);
    let breakplain = g.seq("breakplain", vec![t_break.into()], tpl("(%s);", &[0]));
    let breaklabel = g.seq(
        "breaklabel",
        vec![t_break.into(), ws.into(), t_label.into()],
        tpl("(%s %s);", &[0, 2]),
    );
    let continueplain = g.seq("continueplain", vec![t_continue.into()], tpl("(%s);", &[0]));
    let continuelabel = g.seq(
        "continuelabel",
        vec![t_continue.into(), ws.into(), t_label.into()],
        tpl("(%s %s);", &[0, 2]),
    );
    let returnplain = g.seq("returnplain", vec![t_return.into()], tpl("(%s);", &[0]));
    let returnexp = g.seq(
        "returnexp",
        vec![t_return.into(), ws.into(), exp.into()],
        tpl("(%s %s);", &[0, 2]),
    );
    let yieldexp = g.seq(
        "yieldexp",
        vec![t_yield.into(), ws.into(), exp.into()],
        tpl("(%s %s);", &[0, 2]),
    );
    let stmtbreak = g.alt(
        "stmtbreak",
        vec![
            breakplain.into(),
            breaklabel.into(),
            continueplain.into(),
            continuelabel.into(),
            returnplain.into(),
            returnexp.into(),
            yieldexp.into(),
        ],
        None,
    );

    // ------------------------------------------------------------------
    // Statements and code blocks.
    // ------------------------------------------------------------------
    let stmt = g.alt(
        "stmt",
        vec![
            stmtnew.into(),
            stmtrenew.into(),
            stmtdel.into(),
            stmtisvar.into(),
            stmtassign.into(),
            stmtproccall.into(),
            stmtif.into(),
            stmtelif.into(),
            stmtelse.into(),
            function.into(),
            stmtbreak.into(),
        ],
        None,
    );

    let stmtendl = g.seq(
        "stmtendl",
        vec![stmt.into(), endl.into()],
        tpl("%s", &[0]),
    );
    let semiline = g.seq("semiline", vec![w.into(), t_semi.into()], None);
    let codeblocksemi = g.action("codeblocksemi", semiline.into(), Hook::SemiCheck);
    let blockorstmt = g.alt(
        "blockorstmt",
        vec![stmtendl.into(), forward("codeblock"), codeblocksemi.into()],
        None,
    );

    let t_lbrace = g.keyword("LBRACE", Lbrace, "");
    let nstmt = g.action("nstmt", n.into(), Hook::NoBlockEndSemi);
    let blockend = g.action("blockend", t_rbrace.into(), Hook::CodeBlockEnd);
    let blockstmt = g.action("blockstmt", blockorstmt.into(), Hook::StmtEnd);
    let blockitem = g.alt(
        "blockitem",
        vec![nstmt.into(), blockend.into(), blockstmt.into()],
        None,
    );
    let codeblockbody = g.star("codeblockbody", blockitem.into(), None);
    let blockopen = g.action("blockopen", t_lbrace.into(), Hook::BlockStart);
    let codeblock = g.seq(
        "codeblock",
        vec![blockopen.into(), codeblockbody.into()],
        tpl("", &[]),
    );

    // ------------------------------------------------------------------
    // Command layer: program invocations and command blocks.
    // ------------------------------------------------------------------
    let keyword_kinds = [
        New, Renew, Del, Isvar, Typeof, Void, Return, Yield, If, Elif, Else, Switch, Case,
        Default, While, Loop, Times, Each, In, Where, Break, Continue, Not,
    ];
    let cmdkeyword_alts: Vec<crate::rules::RuleRef> = keyword_kinds
        .iter()
        .map(|&k| g.terminal(format!("CMD_{}", k.wire_name()).as_str(), k).into())
        .collect();
    let cmdkeyword = g.alt("cmdkeyword", cmdkeyword_alts, None);

    let cmdop_kinds = [Arrow, Colon, At, Equals, Tilde, Amp, Pipe, Star, Percent, Caret];
    let mut cmdop_alts: Vec<crate::rules::RuleRef> = cmdop_kinds
        .iter()
        .map(|&k| g.terminal(format!("CMDOP_{}", k.wire_name()).as_str(), k).into())
        .collect();
    cmdop_alts.push(t_dot.into());
    cmdop_alts.push(t_slash.into());
    cmdop_alts.push(t_minus.into());
    cmdop_alts.push(t_userop.into());
    let cmdop = g.alt("cmdop", cmdop_alts, None);

    let cmdliteral = g.alt(
        "cmdliteral",
        vec![
            t_id.into(),
            t_int.into(),
            t_fixed.into(),
            t_str.into(),
            t_regexp.into(),
            t_label.into(),
        ],
        None,
    );
    let programbasic = g.alt(
        "programbasic",
        vec![cmdkeyword.into(), cmdop.into(), cmdliteral.into()],
        None,
    );
    let argexpblock = g.seq(
        "argexpblock",
        vec![
            t_lbrace.into(),
            w.into(),
            exp.into(),
            w.into(),
            t_rbrace.into(),
        ],
        tpl("{%s}", &[2]),
    );
    let argpiece = g.alt(
        "argpiece",
        vec![programbasic.into(), argexpblock.into()],
        None,
    );
    let programarg = g.star("programarg", argpiece.into(), None);
    let wsarg = g.seq(
        "wsarg",
        vec![ws.into(), programarg.into()],
        tpl(" %s", &[1]),
    );
    let programargs = g.star("programargs", wsarg.into(), None);
    let program = g.seq(
        "program",
        vec![programbasic.into(), programarg.into()],
        tpl("%s%s", &[0, 1]),
    );
    let invocation = g.seq(
        "invocation",
        vec![w.into(), program.into(), programargs.into(), endl.into()],
        tpl("[%s%s]", &[1, 2]),
    );
    let cmdinvocation = g.action("cmdinvocation", invocation.into(), Hook::CmdEnd);

    // Command statements inside `[{ ... }]` blocks end like statements but
    // may also end at `}` followed by a line end.
    let cmdstmt = g.seq(
        "cmdstmt",
        vec![stmt.into(), cmdstmtendl.into()],
        tpl("%s", &[0]),
    );
    let blockorcmdstmt = g.alt(
        "blockorcmdstmt",
        vec![cmdstmt.into(), codeblock.into(), codeblocksemi.into()],
        None,
    );
    let cmdrbrace = g.seq("cmdrbrace", vec![t_rbrace.into(), end.into()], None);
    let cmdblockend = g.action("cmdblockend", cmdrbrace.into(), Hook::CodeBlockEnd);
    let cmdblockstmt = g.action("cmdblockstmt", blockorcmdstmt.into(), Hook::StmtEnd);
    let cmdblockitem = g.alt(
        "cmdblockitem",
        vec![nstmt.into(), cmdblockend.into(), cmdblockstmt.into()],
        None,
    );
    let cmdcodeblock = g.star("cmdcodeblock", cmdblockitem.into(), None);

    // `[{ exp }prog args]`: the expression becomes the head of a program
    // invocation once the brace closes.
    let expblockbrace = g.action("expblockbrace", t_rbrace.into(), Hook::ExpBlockEnd);
    let expblockprogram = g.seq(
        "expblockprogram",
        vec![
            w.into(),
            exp.into(),
            w.into(),
            expblockbrace.into(),
            programarg.into(),
            programargs.into(),
            endl.into(),
        ],
        tpl("%s%s]", &[4, 5]),
    );
    let cmdexpblock = g.action("cmdexpblock", expblockprogram.into(), Hook::CmdEnd);

    let cmdblockbody = g.alt(
        "cmdblockbody",
        vec![cmdexpblock.into(), cmdcodeblock.into()],
        None,
    );
    let cmdblockopen = g.action("cmdblockopen", t_lbrace.into(), Hook::CmdBlockStart);
    let cmdblock = g.seq(
        "cmdblock",
        vec![w.into(), cmdblockopen.into(), cmdblockbody.into()],
        tpl("", &[]),
    );

    let cmdline = g.alt(
        "cmdline",
        vec![wn.into(), cmdinvocation.into(), cmdblock.into()],
        None,
    );

    // ------------------------------------------------------------------
    // Roots.
    // ------------------------------------------------------------------
    let scriptitem = g.alt("scriptitem", vec![nstmt.into(), blockstmt.into()], None);
    let script = g.star("script", scriptitem.into(), None);
    let shell = g.star("shell", cmdline.into(), None);

    let grammar = g.build()?;
    Ok(LanguageGrammar {
        grammar: Arc::new(grammar),
        shell,
        script,
    })
}
