/*!
Parsed program tree shared by [`super::parser`] and [`super::codegen`].
Mirrors `tools/mini32_compiler.py`'s dataclasses; the parts spec.md adds
beyond that source (parameters, multi-value return, indexed/pointer
terms) slot into the same shapes rather than needing new ones.
*/

use std::collections::HashMap;

use crate::word::Word;

/// What an identifier resolves to. `Var`/`AbiMem` are memory locations
/// (loaded with `LDA`); `Const`/`Data`/`AbiConst` are immediates (loaded
/// with `LDI`) whose text is substituted directly into the emitted
/// operand expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// Scalar or array local/global, BSS-backed. `offset` is the word
    /// offset from `.bss` (globals) or from the start of this function's
    /// local region (params/locals, before mangling).
    Var { offset: Word, size: Word },
    /// Numeric alias substituted verbatim into operand text.
    Const { value: String },
    /// String literal; its address is its value once the linker's
    /// auto-data pass places it. Referencing a `data` symbol yields that
    /// address as an immediate (`LDI .name`), never its contents.
    Data,
    /// Well-known absolute RAM address from the OS ABI table.
    AbiMem,
    /// Well-known ABI constant (currently only `bss`).
    AbiConst,
}

impl SymbolKind {
    pub fn is_memory(&self) -> bool {
        matches!(self, SymbolKind::Var { .. } | SymbolKind::AbiMem)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    /// The EASM address-expression text for this symbol, e.g. `.counter`
    /// or `.counter + 3`. Used both to read and to write a `Var`/`AbiMem`.
    pub fn address_expr(&self, offset: i64) -> String {
        let base = format!(".{}", self.name);
        if offset == 0 {
            base
        } else if offset > 0 {
            format!("{base} + {offset}")
        } else {
            format!("{base} - {}", -offset)
        }
    }

    /// The EASM immediate-expression text for a `Const`/`Data`/`AbiConst`
    /// symbol, e.g. `.greeting` (a data symbol's own address) or the
    /// literal text of a `const`.
    pub fn immediate_expr(&self) -> String {
        match &self.kind {
            SymbolKind::Const { value } => value.clone(),
            SymbolKind::AbiConst => format!(".{}", self.name),
            SymbolKind::Data | SymbolKind::Var { .. } | SymbolKind::AbiMem => format!(".{}", self.name),
        }
    }
}

/// An index appearing in `name[index]`: a compile-time integer or the
/// runtime value of a scalar variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexExpr {
    Literal(i64),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub derefs: u32,
    pub atom: Atom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Literal(i64),
    Symbol { name: String, index: Option<IndexExpr> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprTerm {
    pub sign: i64,
    pub term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub terms: Vec<ExprTerm>,
}

impl Expression {
    pub fn negated(&self) -> Expression {
        Expression {
            terms: self.terms.iter().map(|t| ExprTerm { sign: -t.sign, term: t.term.clone() }).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    pub name: String,
    pub index: Option<IndexExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LetOp {
    Assign,
    AddAssign,
    SubAssign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A bare expression, tested non-zero/zero via its own value.
    Value(Expression),
    /// `lhs == rhs`, lowered to `(lhs - rhs)` with the branch inverted.
    Eq(Expression, Expression),
    /// `lhs != rhs`, lowered to `(lhs - rhs)` with the branch kept as-is.
    NotEq(Expression, Expression),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Let { target: TargetRef, op: LetOp, expr: Expression },
    Call { callee: String, args: Vec<Expression>, returns: Vec<String>, extern_call: bool },
    Return { values: Vec<Expression> },
    If { cond: Condition, then_body: Vec<Statement>, else_body: Option<Vec<Statement>> },
    While { cond: Condition, body: Vec<Statement> },
    Break,
    Continue,
    Asm { payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    /// Bare name -> mangled `Symbol` for this function's params/locals,
    /// snapshotted when the parser finishes this function's body. The
    /// parser's own scratch map is cleared and reused per function, so
    /// code generation resolves names through this copy rather than
    /// through the (by-then long gone) parser.
    pub locals: HashMap<String, Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstDef {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    pub name: String,
    pub offset: Word,
    pub size: Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDef {
    pub name: String,
    /// Already-quoted EASM string literal text, e.g. `"hi\n"`.
    pub literal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub meta: Vec<(String, String)>,
    pub deps: Vec<String>,
    pub consts: Vec<ConstDef>,
    pub vars: Vec<VarDef>,
    pub data: Vec<DataDef>,
    pub functions: Vec<FunctionDef>,
}
