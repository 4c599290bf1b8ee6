// AST (Abstract Syntax Tree) definitions for PICO-8 Lua

use serde::Serialize;
use std::fmt;

use crate::analysis::definitions::DefinitionsUsagesLookup;
use crate::analysis::symbols::Symbol;
use crate::parser::parse::{ParseError, Warning};

/// Index of a source file within one parse; `FileId::ROOT` is the document
/// handed to the parser, included files follow in the order they were opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct FileId(pub u32);

impl FileId {
    pub const ROOT: FileId = FileId(0);
}

/// A single point in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub line: usize,   // 1-based
    pub column: usize, // 1-based, counted in characters
    pub index: usize,  // 0-based character index
    pub file: FileId,
}

impl Position {
    pub fn new(line: usize, column: usize, index: usize, file: FileId) -> Self {
        Self {
            line,
            column,
            index,
            file,
        }
    }
}

/// Source span; `end` points just past the last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bounds {
    pub start: Position,
    pub end: Position,
}

impl Bounds {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn file(&self) -> FileId {
        self.start.file
    }

    /// Whether `(line, column)` of `file` falls inside this span. Both ends
    /// are inclusive so a cursor resting right after a name still hits it.
    pub fn contains(&self, file: FileId, line: usize, column: usize) -> bool {
        if self.start.file != file || self.end.file != file {
            return false;
        }
        let after_start = line > self.start.line
            || (line == self.start.line && column >= self.start.column);
        let before_end =
            line < self.end.line || (line == self.end.line && column <= self.end.column);
        after_start && before_end
    }

    /// Whether `other` lies completely inside this span.
    pub fn encloses(&self, other: &Bounds) -> bool {
        if self.start.file != other.start.file || self.end.file != other.end.file {
            return false;
        }
        self.start.index <= other.start.index && other.end.index <= self.end.index
    }

    pub fn len(&self) -> usize {
        self.end.index.saturating_sub(self.start.index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    // Arithmetic
    Pow,
    Mul,
    Div,
    Mod,
    IntDiv,
    Add,
    Sub,
    Concat,
    // Bitwise
    Shl,
    Shr,
    LogicalShr,
    RotateLeft,
    RotateRight,
    BitAnd,
    BitXor,
    BitOr,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn from_punctuator(text: &str) -> Option<Self> {
        let op = match text {
            "^" => BinaryOp::Pow,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "\\" => BinaryOp::IntDiv,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            ".." => BinaryOp::Concat,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            ">>>" => BinaryOp::LogicalShr,
            "<<>" => BinaryOp::RotateLeft,
            ">><" => BinaryOp::RotateRight,
            "&" => BinaryOp::BitAnd,
            "^^" => BinaryOp::BitXor,
            "|" => BinaryOp::BitOr,
            "==" => BinaryOp::Eq,
            "~=" | "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    /// Binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Pow => 12,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::IntDiv => 10,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Concat => 8,
            BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::LogicalShr
            | BinaryOp::RotateLeft
            | BinaryOp::RotateRight => 7,
            BinaryOp::BitAnd => 6,
            BinaryOp::BitXor => 5,
            BinaryOp::BitOr => 4,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryOp::Pow | BinaryOp::Concat)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::IntDiv => "\\",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Concat => "..",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogicalShr => ">>>",
            BinaryOp::RotateLeft => "<<>",
            BinaryOp::RotateRight => ">><",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^^",
            BinaryOp::BitOr => "|",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "~=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn precedence(self) -> u8 {
        match self {
            LogicalOp::And => 2,
            LogicalOp::Or => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,    // -x
    Len,    // #x
    Not,    // not x
    BitNot, // ~x
    Peek,   // @addr
    Peek2,  // %addr
    Peek4,  // $addr
}

impl UnaryOp {
    pub fn from_token(text: &str) -> Option<Self> {
        let op = match text {
            "-" => UnaryOp::Neg,
            "#" => UnaryOp::Len,
            "not" => UnaryOp::Not,
            "~" => UnaryOp::BitNot,
            "@" => UnaryOp::Peek,
            "%" => UnaryOp::Peek2,
            "$" => UnaryOp::Peek4,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Len => "#",
            UnaryOp::Not => "not",
            UnaryOp::BitNot => "~",
            UnaryOp::Peek => "@",
            UnaryOp::Peek2 => "%",
            UnaryOp::Peek4 => "$",
        }
    }
}

/// Plain `=` or one of the compound assignment operators (`+=`, `..=`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn from_punctuator(text: &str) -> Option<Self> {
        if text == "=" {
            return Some(AssignOp::Assign);
        }
        let op = text.strip_suffix('=')?;
        // `==`, `<=`, `>=` and `~=` are comparisons, not assignments
        if matches!(op, "=" | "<" | ">" | "~" | "!") {
            return None;
        }
        BinaryOp::from_punctuator(op).map(AssignOp::Compound)
    }

    pub fn is_compound(self) -> bool {
        matches!(self, AssignOp::Compound(_))
    }
}

/// `.` or `:` in a member expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Indexer {
    Dot,
    Colon,
}

impl Indexer {
    pub fn as_char(self) -> char {
        match self {
            Indexer::Dot => '.',
            Indexer::Colon => ':',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identifier {
    pub name: String,
    pub is_local: bool,
    pub loc: Bounds,
}

impl Identifier {
    pub fn new(name: impl Into<String>, loc: Bounds) -> Self {
        Identifier {
            name: name.into(),
            is_local: false,
            loc,
        }
    }

    pub fn local(mut self, is_local: bool) -> Self {
        self.is_local = is_local;
        self
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Parameter {
    Name(Identifier),
    Vararg(Bounds),
}

impl Parameter {
    pub fn display_name(&self) -> &str {
        match self {
            Parameter::Name(ident) => &ident.name,
            Parameter::Vararg(_) => "...",
        }
    }
}

/// Named or anonymous function; statement or expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    /// `None` for anonymous functions; otherwise an identifier or member expression
    pub identifier: Option<Box<Expression>>,
    pub is_local: bool,
    pub parameters: Vec<Parameter>,
    pub body: Block,
    pub loc: Bounds,
}

impl FunctionDeclaration {
    pub fn is_method(&self) -> bool {
        matches!(
            self.identifier.as_deref(),
            Some(Expression::Member {
                indexer: Indexer::Colon,
                ..
            })
        )
    }

    /// `"(a,b,...)"`, shown next to function symbols
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(Parameter::display_name).collect();
        format!("({})", params.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClauseKind {
    If,
    ElseIf,
    Else,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfClause {
    pub kind: ClauseKind,
    /// `None` only for the `else` clause
    pub condition: Option<Expression>,
    pub body: Block,
    pub loc: Bounds,
}

/// Table constructor field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TableField {
    /// `[key] = value`
    Keyed {
        key: Expression,
        value: Expression,
        loc: Bounds,
    },
    /// `name = value`
    Named {
        key: Identifier,
        value: Expression,
        loc: Bounds,
    },
    /// `value`
    Positional { value: Expression, loc: Bounds },
}

impl TableField {
    pub fn value(&self) -> &Expression {
        match self {
            TableField::Keyed { value, .. }
            | TableField::Named { value, .. }
            | TableField::Positional { value, .. } => value,
        }
    }

    pub fn loc(&self) -> &Bounds {
        match self {
            TableField::Keyed { loc, .. }
            | TableField::Named { loc, .. }
            | TableField::Positional { loc, .. } => loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableConstructor {
    pub fields: Vec<TableField>,
    pub loc: Bounds,
}

pub type Block = Vec<Statement>;

/// Statement nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Statement {
    Assignment {
        variables: Vec<Expression>,
        operator: AssignOp,
        init: Vec<Expression>,
        loc: Bounds,
    },
    Local {
        variables: Vec<Identifier>,
        init: Vec<Expression>,
        loc: Bounds,
    },
    Call {
        expression: Expression,
        loc: Bounds,
    },
    Do {
        body: Block,
        loc: Bounds,
    },
    While {
        condition: Expression,
        body: Block,
        loc: Bounds,
    },
    Repeat {
        body: Block,
        condition: Expression,
        loc: Bounds,
    },
    If {
        clauses: Vec<IfClause>,
        one_line: bool,
        loc: Bounds,
    },
    ForNumeric {
        variable: Identifier,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
        body: Block,
        loc: Bounds,
    },
    ForGeneric {
        variables: Vec<Identifier>,
        iterators: Vec<Expression>,
        body: Block,
        loc: Bounds,
    },
    Function(FunctionDeclaration),
    Return {
        arguments: Vec<Expression>,
        loc: Bounds,
    },
    Break {
        loc: Bounds,
    },
    Goto {
        label: Identifier,
        loc: Bounds,
    },
    Label {
        label: Identifier,
        loc: Bounds,
    },
    Include {
        filename: String,
        loc: Bounds,
    },
}

impl Statement {
    /// Get the source span of this statement
    pub fn loc(&self) -> &Bounds {
        match self {
            Statement::Assignment { loc, .. } => loc,
            Statement::Local { loc, .. } => loc,
            Statement::Call { loc, .. } => loc,
            Statement::Do { loc, .. } => loc,
            Statement::While { loc, .. } => loc,
            Statement::Repeat { loc, .. } => loc,
            Statement::If { loc, .. } => loc,
            Statement::ForNumeric { loc, .. } => loc,
            Statement::ForGeneric { loc, .. } => loc,
            Statement::Function(func) => &func.loc,
            Statement::Return { loc, .. } => loc,
            Statement::Break { loc } => loc,
            Statement::Goto { loc, .. } => loc,
            Statement::Label { loc, .. } => loc,
            Statement::Include { loc, .. } => loc,
        }
    }
}

/// Expression nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Expression {
    Identifier(Identifier),
    String {
        /// `None` when the encoding mode discards string contents
        value: Option<String>,
        raw: String,
        loc: Bounds,
    },
    Number {
        value: f64,
        raw: String,
        loc: Bounds,
    },
    Boolean {
        value: bool,
        loc: Bounds,
    },
    Nil {
        loc: Bounds,
    },
    Vararg {
        loc: Bounds,
    },
    Binary {
        operator: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        loc: Bounds,
    },
    Logical {
        operator: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
        loc: Bounds,
    },
    Unary {
        operator: UnaryOp,
        argument: Box<Expression>,
        loc: Bounds,
    },
    Member {
        base: Box<Expression>,
        indexer: Indexer,
        identifier: Identifier,
        loc: Bounds,
    },
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
        loc: Bounds,
    },
    Call {
        base: Box<Expression>,
        arguments: Vec<Expression>,
        loc: Bounds,
    },
    TableCall {
        base: Box<Expression>,
        argument: TableConstructor,
        loc: Bounds,
    },
    StringCall {
        base: Box<Expression>,
        argument: Box<Expression>,
        loc: Bounds,
    },
    Table(TableConstructor),
    Function(Box<FunctionDeclaration>),
}

impl Expression {
    /// Get the source span of this expression
    pub fn loc(&self) -> &Bounds {
        match self {
            Expression::Identifier(ident) => &ident.loc,
            Expression::String { loc, .. } => loc,
            Expression::Number { loc, .. } => loc,
            Expression::Boolean { loc, .. } => loc,
            Expression::Nil { loc } => loc,
            Expression::Vararg { loc } => loc,
            Expression::Binary { loc, .. } => loc,
            Expression::Logical { loc, .. } => loc,
            Expression::Unary { loc, .. } => loc,
            Expression::Member { loc, .. } => loc,
            Expression::Index { loc, .. } => loc,
            Expression::Call { loc, .. } => loc,
            Expression::TableCall { loc, .. } => loc,
            Expression::StringCall { loc, .. } => loc,
            Expression::Table(table) => &table.loc,
            Expression::Function(func) => &func.loc,
        }
    }

    /// Build a binary node, routing `and`/`or` to [`Expression::Logical`].
    pub fn binary(
        operator: &str,
        left: Expression,
        right: Expression,
        loc: Bounds,
    ) -> Option<Self> {
        let left = Box::new(left);
        let right = Box::new(right);
        let node = match operator {
            "and" => Expression::Logical {
                operator: LogicalOp::And,
                left,
                right,
                loc,
            },
            "or" => Expression::Logical {
                operator: LogicalOp::Or,
                left,
                right,
                loc,
            },
            _ => Expression::Binary {
                operator: BinaryOp::from_punctuator(operator)?,
                left,
                right,
                loc,
            },
        };
        Some(node)
    }

    pub fn member(base: Expression, indexer: Indexer, identifier: Identifier, loc: Bounds) -> Self {
        Expression::Member {
            base: Box::new(base),
            indexer,
            identifier,
            loc,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(ident) => Some(ident),
            _ => None,
        }
    }

    /// Dotted name of an identifier/member chain (`a.b:c` -> `a.b:c`), or
    /// `None` once anything else (calls, indexing) appears in the chain.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expression::Identifier(ident) => Some(ident.name.clone()),
            Expression::Member {
                base,
                indexer,
                identifier,
                ..
            } => {
                let mut name = base.dotted_name()?;
                name.push(indexer.as_char());
                name.push_str(&identifier.name);
                Some(name)
            }
            _ => None,
        }
    }

    /// The identifier at the root of a member chain (`a` in `a.b.c`).
    pub fn root_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(ident) => Some(ident),
            Expression::Member { base, .. } => base.root_identifier(),
            _ => None,
        }
    }
}

/// Root node of one parsed document.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub body: Block,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<Warning>,
    pub symbols: Vec<Symbol>,
    #[serde(skip)]
    pub definitions_usages: DefinitionsUsagesLookup,
    /// Distinct global names in order of first appearance
    pub globals: Vec<String>,
    /// Paths of every file that contributed to this chunk, indexed by [`FileId`]
    pub files: Vec<String>,
    pub loc: Bounds,
}

impl Chunk {
    pub fn file_name(&self, file: FileId) -> Option<&str> {
        self.files.get(file.0 as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize, index: usize) -> Position {
        Position::new(line, column, index, FileId::ROOT)
    }

    #[test]
    fn test_bounds_contains_inclusive_ends() {
        let bounds = Bounds::new(pos(2, 3, 10), pos(2, 6, 13));
        assert!(bounds.contains(FileId::ROOT, 2, 3));
        assert!(bounds.contains(FileId::ROOT, 2, 6));
        assert!(!bounds.contains(FileId::ROOT, 2, 7));
        assert!(!bounds.contains(FileId::ROOT, 1, 4));
        assert!(!bounds.contains(FileId(1), 2, 4));
    }

    #[test]
    fn test_assign_op_rejects_comparisons() {
        assert_eq!(AssignOp::from_punctuator("="), Some(AssignOp::Assign));
        assert_eq!(
            AssignOp::from_punctuator("..="),
            Some(AssignOp::Compound(BinaryOp::Concat))
        );
        assert_eq!(
            AssignOp::from_punctuator(">>>="),
            Some(AssignOp::Compound(BinaryOp::LogicalShr))
        );
        assert_eq!(AssignOp::from_punctuator("=="), None);
        assert_eq!(AssignOp::from_punctuator("<="), None);
        assert_eq!(AssignOp::from_punctuator("~="), None);
        assert_eq!(AssignOp::from_punctuator("!="), None);
    }

    #[test]
    fn test_precedence_order() {
        let ordered = [
            BinaryOp::Pow.precedence(),
            BinaryOp::Mul.precedence(),
            BinaryOp::Add.precedence(),
            BinaryOp::Concat.precedence(),
            BinaryOp::Shl.precedence(),
            BinaryOp::BitAnd.precedence(),
            BinaryOp::BitXor.precedence(),
            BinaryOp::BitOr.precedence(),
            BinaryOp::Lt.precedence(),
            LogicalOp::And.precedence(),
            LogicalOp::Or.precedence(),
        ];
        assert!(ordered.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_dotted_name() {
        let b = Bounds::new(pos(1, 1, 0), pos(1, 2, 1));
        let expr = Expression::member(
            Expression::member(
                Expression::Identifier(Identifier::new("a", b)),
                Indexer::Dot,
                Identifier::new("b", b),
                b,
            ),
            Indexer::Colon,
            Identifier::new("c", b),
            b,
        );
        assert_eq!(expr.dotted_name().as_deref(), Some("a.b:c"));
        assert_eq!(expr.root_identifier().map(|i| i.name.as_str()), Some("a"));
    }
}
