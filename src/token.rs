//! Lexical tokens and the pre-lexed wire format.
//!
//! The parser never sees raw text: a front-end lexer hands it whitespace-
//! separated fields, one per token, each either a bare kind name (`SEMI`,
//! `LBRACE`) or a kind with a payload (`ID:grep`, `INT:42`). A `NEWL` token
//! marks the end of every input line.

use serde::{Deserialize, Serialize};

use crate::diagnostics::LashError;

/// Every token kind the lexer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Layout
    Ws,
    Newl,
    Semi,
    // Value-bearing tokens
    Int,
    Fixed,
    Str,
    Id,
    Regexp,
    Label,
    Userop,
    // Keywords: symbol table
    New,
    Renew,
    Del,
    Isvar,
    Typeof,
    // Keywords: functions
    Void,
    Return,
    Yield,
    // Keywords: branches
    If,
    Elif,
    Else,
    Switch,
    Case,
    Default,
    // Keywords: loops
    While,
    Loop,
    Times,
    Each,
    In,
    Where,
    Break,
    Continue,
    // Keywords: logic
    Not,
    Nor,
    And,
    Or,
    Xor,
    Xnor,
    // Comparison operators
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    // Numeric operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    // Object operators
    Pipe,
    Amp,
    Tilde,
    Doubletilde,
    // Assignment operators
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
    // Cast
    Arrow,
    // Delimiters
    Lparen,
    Rparen,
    Lbracket,
    Rbracket,
    Lbrace,
    Rbrace,
    Comma,
    Dot,
    Colon,
    At,
}

impl TokenKind {
    /// The wire name, as emitted by the lexer.
    pub fn wire_name(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Ws => "WS",
            Newl => "NEWL",
            Semi => "SEMI",
            Int => "INT",
            Fixed => "FIXED",
            Str => "STR",
            Id => "ID",
            Regexp => "REGEXP",
            Label => "LABEL",
            Userop => "USEROP",
            New => "NEW",
            Renew => "RENEW",
            Del => "DEL",
            Isvar => "ISVAR",
            Typeof => "TYPEOF",
            Void => "VOID",
            Return => "RETURN",
            Yield => "YIELD",
            If => "IF",
            Elif => "ELIF",
            Else => "ELSE",
            Switch => "SWITCH",
            Case => "CASE",
            Default => "DEFAULT",
            While => "WHILE",
            Loop => "LOOP",
            Times => "TIMES",
            Each => "EACH",
            In => "IN",
            Where => "WHERE",
            Break => "BREAK",
            Continue => "CONTINUE",
            Not => "NOT",
            Nor => "NOR",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Xnor => "XNOR",
            Lt => "LT",
            Le => "LE",
            Gt => "GT",
            Ge => "GE",
            Eq => "EQ",
            Ne => "NE",
            Plus => "PLUS",
            Minus => "MINUS",
            Star => "STAR",
            Slash => "SLASH",
            Percent => "PERCENT",
            Caret => "CARAT",
            Pipe => "PIPE",
            Amp => "AMP",
            Tilde => "TILDE",
            Doubletilde => "DOUBLETILDE",
            Equals => "EQUALS",
            PlusEquals => "PLUSEQUALS",
            MinusEquals => "MINUSEQUALS",
            StarEquals => "STAREQUALS",
            SlashEquals => "SLASHEQUALS",
            PercentEquals => "PERCENTEQUALS",
            CaretEquals => "CARATEQUALS",
            PipeEquals => "PIPEEQUALS",
            AmpEquals => "AMPEQUALS",
            TildeEquals => "TILDEEQUALS",
            Arrow => "ARROW",
            Lparen => "LPAREN",
            Rparen => "RPAREN",
            Lbracket => "LBRACKET",
            Rbracket => "RBRACKET",
            Lbrace => "LBRACE",
            Rbrace => "RBRACE",
            Comma => "COMMA",
            Dot => "DOT",
            Colon => "COLON",
            At => "AT",
        }
    }

    /// Kinds whose surface text comes from the lexer rather than the kind
    /// itself. On the wire these require a `:payload` suffix.
    pub fn carries_payload(&self) -> bool {
        use TokenKind::*;
        matches!(self, Int | Fixed | Str | Id | Regexp | Label | Userop)
    }

    /// Canonical surface text for fixed-lexeme kinds.
    pub fn lexeme(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Ws => " ",
            Newl => "\n",
            Semi => ";",
            New => "new",
            Renew => "renew",
            Del => "del",
            Isvar => "isvar",
            Typeof => "typeof",
            Void => "void",
            Return => "return",
            Yield => "yield",
            If => "if",
            Elif => "elif",
            Else => "else",
            Switch => "switch",
            Case => "case",
            Default => "default",
            While => "while",
            Loop => "loop",
            Times => "times",
            Each => "each",
            In => "in",
            Where => "where",
            Break => "break",
            Continue => "continue",
            Not => "not",
            Nor => "nor",
            And => "and",
            Or => "or",
            Xor => "xor",
            Xnor => "xnor",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Eq => "==",
            Ne => "!=",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Caret => "^",
            Pipe => "|",
            Amp => "&",
            Tilde => "~",
            Doubletilde => "~~",
            Equals => "=",
            PlusEquals => "+=",
            MinusEquals => "-=",
            StarEquals => "*=",
            SlashEquals => "/=",
            PercentEquals => "%=",
            CaretEquals => "^=",
            PipeEquals => "|=",
            AmpEquals => "&=",
            TildeEquals => "~=",
            Arrow => "->",
            Lparen => "(",
            Rparen => ")",
            Lbracket => "[",
            Rbracket => "]",
            Lbrace => "{",
            Rbrace => "}",
            Comma => ",",
            Dot => ".",
            Colon => ":",
            At => "@",
            Int | Fixed | Str | Id | Regexp | Label | Userop => "",
        }
    }

    fn from_wire_name(name: &str) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match name {
            "WS" => Ws,
            "NEWL" => Newl,
            "SEMI" => Semi,
            "INT" => Int,
            "FIXED" => Fixed,
            "STR" => Str,
            "ID" => Id,
            "REGEXP" => Regexp,
            "LABEL" => Label,
            "USEROP" => Userop,
            "NEW" => New,
            "RENEW" => Renew,
            "DEL" => Del,
            "ISVAR" => Isvar,
            "TYPEOF" => Typeof,
            "VOID" => Void,
            "RETURN" => Return,
            "YIELD" => Yield,
            "IF" => If,
            "ELIF" => Elif,
            "ELSE" => Else,
            "SWITCH" => Switch,
            "CASE" => Case,
            "DEFAULT" => Default,
            "WHILE" => While,
            "LOOP" => Loop,
            "TIMES" => Times,
            "EACH" => Each,
            "IN" => In,
            "WHERE" => Where,
            "BREAK" => Break,
            "CONTINUE" => Continue,
            "NOT" => Not,
            "NOR" => Nor,
            "AND" => And,
            "OR" => Or,
            "XOR" => Xor,
            "XNOR" => Xnor,
            "LT" => Lt,
            "LE" => Le,
            "GT" => Gt,
            "GE" => Ge,
            "EQ" => Eq,
            "NE" => Ne,
            "PLUS" => Plus,
            "MINUS" => Minus,
            "STAR" => Star,
            "SLASH" => Slash,
            "PERCENT" => Percent,
            "CARAT" => Caret,
            "PIPE" => Pipe,
            "AMP" => Amp,
            "TILDE" => Tilde,
            "DOUBLETILDE" => Doubletilde,
            "EQUALS" => Equals,
            "PLUSEQUALS" => PlusEquals,
            "MINUSEQUALS" => MinusEquals,
            "STAREQUALS" => StarEquals,
            "SLASHEQUALS" => SlashEquals,
            "PERCENTEQUALS" => PercentEquals,
            "CARATEQUALS" => CaretEquals,
            "PIPEEQUALS" => PipeEquals,
            "AMPEQUALS" => AmpEquals,
            "TILDEEQUALS" => TildeEquals,
            "ARROW" => Arrow,
            "LPAREN" => Lparen,
            "RPAREN" => Rparen,
            "LBRACKET" => Lbracket,
            "RBRACKET" => Rbracket,
            "LBRACE" => Lbrace,
            "RBRACE" => Rbrace,
            "COMMA" => Comma,
            "DOT" => Dot,
            "COLON" => Colon,
            "AT" => At,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// One lexed token: a kind plus its surface text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    /// A token of a fixed-lexeme kind, with its canonical text.
    pub fn bare(kind: TokenKind) -> Token {
        Token {
            kind,
            text: kind.lexeme().to_string(),
        }
    }

    /// A value-bearing token.
    pub fn with_text(kind: TokenKind, text: impl Into<String>) -> Token {
        Token {
            kind,
            text: text.into(),
        }
    }

    /// The end-of-line marker the line driver appends to every input line.
    pub fn newline() -> Token {
        Token::bare(TokenKind::Newl)
    }

    /// Parses one wire field: `KIND` or `KIND:payload`.
    pub fn from_wire(field: &str) -> Result<Token, LashError> {
        let (name, payload) = match field.split_once(':') {
            Some((name, payload)) => (name, Some(payload)),
            None => (field, None),
        };
        let kind = TokenKind::from_wire_name(name).ok_or_else(|| LashError::Token {
            field: field.to_string(),
        })?;
        match (kind.carries_payload(), payload) {
            (true, Some(p)) => Ok(Token::with_text(kind, p)),
            (true, None) => Err(LashError::Token {
                field: format!("{field} (missing :payload)"),
            }),
            (false, None) => Ok(Token::bare(kind)),
            (false, Some(_)) => Err(LashError::Token {
                field: format!("{field} (unexpected payload)"),
            }),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.kind.carries_payload() {
            write!(f, "{}:{}", self.kind.wire_name(), self.text)
        } else {
            write!(f, "{}", self.kind.wire_name())
        }
    }
}

/// Parses one whitespace-separated line of wire fields.
pub fn tokenize_line(line: &str) -> Result<Vec<Token>, LashError> {
    line.split_whitespace().map(Token::from_wire).collect()
}
