//! Token definitions for the ES5 lexer.

/// A span in the source code, representing a range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
    /// Line the token starts on (1-based)
    pub line: u32,
    /// A line terminator preceded the token
    pub lineterm: bool,
    /// Automatic semicolon insertion may happen before this token
    pub allow_auto_semi: bool,
    /// Number of escapes decoded inside the token
    pub num_escapes: u32,
}

impl Token {
    /// Creates a new token on line 1 without line terminator info.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            line: 1,
            lineterm: false,
            allow_auto_semi: false,
            num_escapes: 0,
        }
    }

    /// A placeholder token used before the first `advance()`.
    ///
    /// Its kind doesn't suppress regexp parsing, so the first real token is
    /// lexed in regexp mode.
    pub fn start_of_input() -> Self {
        Self::new(TokenKind::Invalid, Span::default())
    }

    /// Returns the IdentifierName spelled by this token.
    ///
    /// Reserved words (including `null`, `true` and `false`) are identifier
    /// names too, which matters for property names such as `a.if` or
    /// `{ while: 1 }`.
    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            other => other.reserved_word(),
        }
    }
}

/// The different kinds of ES5 tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Numeric literal
    Number(f64),
    /// String literal (escapes decoded)
    String(String),
    /// Regular expression literal
    RegExp {
        /// Body between the slashes
        pattern: String,
        /// Flag characters
        flags: String,
    },
    /// Boolean true
    True,
    /// Boolean false
    False,
    /// null
    Null,

    /// Identifier that is not a reserved word in the current strictness
    Identifier(String),

    // Keywords
    /// `break`
    Break,
    /// `case`
    Case,
    /// `catch`
    Catch,
    /// `continue`
    Continue,
    /// `debugger`
    Debugger,
    /// `default`
    Default,
    /// `delete`
    Delete,
    /// `do`
    Do,
    /// `else`
    Else,
    /// `finally`
    Finally,
    /// `for`
    For,
    /// `function`
    Function,
    /// `if`
    If,
    /// `in`
    In,
    /// `instanceof`
    Instanceof,
    /// `new`
    New,
    /// `return`
    Return,
    /// `switch`
    Switch,
    /// `this`
    This,
    /// `throw`
    Throw,
    /// `try`
    Try,
    /// `typeof`
    Typeof,
    /// `var`
    Var,
    /// `void`
    Void,
    /// `while`
    While,
    /// `with`
    With,

    // Future reserved words
    /// `class`
    Class,
    /// `const`
    Const,
    /// `enum`
    Enum,
    /// `export`
    Export,
    /// `extends`
    Extends,
    /// `import`
    Import,
    /// `super`
    Super,

    // Future reserved words recognised only in strict mode code
    /// `implements` (reserved in strict mode code)
    Implements,
    /// `interface` (reserved in strict mode code)
    Interface,
    /// `let` (reserved in strict mode code)
    Let,
    /// `package` (reserved in strict mode code)
    Package,
    /// `private` (reserved in strict mode code)
    Private,
    /// `protected` (reserved in strict mode code)
    Protected,
    /// `public` (reserved in strict mode code)
    Public,
    /// `static` (reserved in strict mode code)
    Static,
    /// `yield` (reserved in strict mode code)
    Yield,

    // Punctuation
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// .
    Dot,
    /// ;
    Semicolon,
    /// ,
    Comma,
    /// <
    LessThan,
    /// >
    GreaterThan,
    /// <=
    LessThanEqual,
    /// >=
    GreaterThanEqual,
    /// ==
    EqualEqual,
    /// !=
    NotEqual,
    /// ===
    StrictEqual,
    /// !==
    StrictNotEqual,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,
    /// <<
    LeftShift,
    /// >>
    RightShift,
    /// >>>
    UnsignedRightShift,
    /// &
    Ampersand,
    /// |
    Pipe,
    /// ^
    Caret,
    /// !
    Bang,
    /// ~
    Tilde,
    /// &&
    AmpersandAmpersand,
    /// ||
    PipePipe,
    /// ?
    Question,
    /// :
    Colon,
    /// =
    Equal,
    /// +=
    PlusEqual,
    /// -=
    MinusEqual,
    /// *=
    StarEqual,
    /// /=
    SlashEqual,
    /// %=
    PercentEqual,
    /// <<=
    LeftShiftEqual,
    /// >>=
    RightShiftEqual,
    /// >>>=
    UnsignedRightShiftEqual,
    /// &=
    AmpersandEqual,
    /// |=
    PipeEqual,
    /// ^=
    CaretEqual,

    // Special
    /// End of input
    Eof,
    /// No token yet (compiler start state)
    Invalid,
}

/// Keywords, future reserved words and literal words valid in all code.
const RESERVED: &[(&str, TokenKind)] = &[
    ("break", TokenKind::Break),
    ("case", TokenKind::Case),
    ("catch", TokenKind::Catch),
    ("continue", TokenKind::Continue),
    ("debugger", TokenKind::Debugger),
    ("default", TokenKind::Default),
    ("delete", TokenKind::Delete),
    ("do", TokenKind::Do),
    ("else", TokenKind::Else),
    ("finally", TokenKind::Finally),
    ("for", TokenKind::For),
    ("function", TokenKind::Function),
    ("if", TokenKind::If),
    ("in", TokenKind::In),
    ("instanceof", TokenKind::Instanceof),
    ("new", TokenKind::New),
    ("return", TokenKind::Return),
    ("switch", TokenKind::Switch),
    ("this", TokenKind::This),
    ("throw", TokenKind::Throw),
    ("try", TokenKind::Try),
    ("typeof", TokenKind::Typeof),
    ("var", TokenKind::Var),
    ("void", TokenKind::Void),
    ("while", TokenKind::While),
    ("with", TokenKind::With),
    ("class", TokenKind::Class),
    ("const", TokenKind::Const),
    ("enum", TokenKind::Enum),
    ("export", TokenKind::Export),
    ("extends", TokenKind::Extends),
    ("import", TokenKind::Import),
    ("super", TokenKind::Super),
    ("null", TokenKind::Null),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
];

/// Additional reserved words in strict mode code (E5 Section 7.6.1.2).
const STRICT_RESERVED: &[(&str, TokenKind)] = &[
    ("implements", TokenKind::Implements),
    ("interface", TokenKind::Interface),
    ("let", TokenKind::Let),
    ("package", TokenKind::Package),
    ("private", TokenKind::Private),
    ("protected", TokenKind::Protected),
    ("public", TokenKind::Public),
    ("static", TokenKind::Static),
    ("yield", TokenKind::Yield),
];

/// Looks up the reserved word token for `name`, honouring strictness.
pub(crate) fn lookup_reserved(name: &str, strict: bool) -> Option<TokenKind> {
    let found = RESERVED.iter().find(|(word, _)| *word == name);
    if let Some((_, kind)) = found {
        return Some(kind.clone());
    }
    if strict {
        return STRICT_RESERVED
            .iter()
            .find(|(word, _)| *word == name)
            .map(|(_, kind)| kind.clone());
    }
    None
}

/// Returns true if `name` is reserved in non-strict code.
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED.iter().any(|(word, _)| *word == name)
}

/// Returns true if `name` is one of the words reserved only in strict code.
pub fn is_strict_reserved_word(name: &str) -> bool {
    STRICT_RESERVED.iter().any(|(word, _)| *word == name)
}

impl TokenKind {
    /// Returns the source spelling of a reserved word token.
    pub fn reserved_word(&self) -> Option<&'static str> {
        RESERVED
            .iter()
            .chain(STRICT_RESERVED.iter())
            .find(|(_, kind)| kind == self)
            .map(|(word, _)| *word)
    }

    /// Returns true if this token is a keyword or reserved word.
    pub fn is_keyword(&self) -> bool {
        self.reserved_word().is_some() && !self.is_literal()
    }

    /// Returns true if this token is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::RegExp { .. }
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    /// Returns true if a `/` after this token is a division operator.
    ///
    /// Tokens that end an operand suppress regexp literal parsing for the
    /// token that follows them.
    pub fn rejects_regexp(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::This
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
                | TokenKind::RightBrace
                | TokenKind::RightBracket
                | TokenKind::RightParen
                | TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::RegExp { .. }
        )
    }
}
