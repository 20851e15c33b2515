/*!
Recursive-descent parser over the preprocessed line list, grounded in
`tools/mini32_compiler.py`'s `Mini32Parser`: the same top-level
dispatch (`meta`/`depends`/`const`/`var`/`data`/`func`), the same
expression splitter (sign-tracking over a bracket-depth counter), and
the same symbol table seeded from the OS ABI. Parameters, multi-value
`return`, and indexed/pointer terms are new productions layered on top,
following spec.md's prose in the same recursive-descent style.
*/

use std::collections::HashMap;

use crate::error::{EduvmError, Result};
use crate::link::abi::ABI_SLOTS;
use crate::word::Word;

use super::ast::*;
use super::lexer::LogicalLine;

fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

/// Strips a Python-style single- or double-quoted ASCII string literal,
/// unescaping `\n`, `\t`, `\\`, and the matching quote.
fn parse_string_literal(text: &str) -> Option<String> {
    let text = text.trim();
    let quote = text.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    if text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    let inner = &text[1..text.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(q) if q == quote => out.push(q),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    if !out.is_ascii() {
        return None;
    }
    Some(out)
}

/// Re-quotes a decoded string as EASM double-quoted literal text.
fn requote(text: &str) -> String {
    let mut out = String::from("\"");
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

struct LoopDepth(usize);

pub struct Parser<'a> {
    source_name: &'a str,
    lines: Vec<LogicalLine>,
    pos: usize,
    program: Program,
    bss_cursor: Word,
    globals: HashMap<String, Symbol>,
    locals: HashMap<String, Symbol>,
    current_func: String,
    loop_depth: LoopDepth,
}

impl<'a> Parser<'a> {
    pub fn new(source_name: &'a str, lines: Vec<LogicalLine>) -> Self {
        let mut globals = HashMap::new();
        for (name, _) in ABI_SLOTS {
            globals.insert((*name).to_string(), Symbol { name: (*name).to_string(), kind: SymbolKind::AbiMem });
        }
        // `bss` itself is not in ABI_SLOTS (it is the auto base address the
        // loader places, not a fixed memory-mapped slot); seed it separately.
        globals.insert("bss".to_string(), Symbol { name: "bss".to_string(), kind: SymbolKind::AbiConst });

        let mut program = Program::default();
        let mut bss_cursor: Word = 0;
        // Reserved codegen scratch cells: `__tmp_addr` backs the
        // store-then-indirect-load dance for indexed/pointer access and
        // dereference (`*x`); `__tmp_sum` holds a running total while a
        // follow-up expression term needs its own scratch to compute;
        // `__tmp_b` is a second scratch for that computation itself, kept
        // distinct from `__tmp_sum` so a negated indexed/pointer term
        // nested inside the `__tmp_sum` save doesn't clobber it.
        for scratch in ["__tmp_addr", "__tmp_sum", "__tmp_b"] {
            program.vars.push(VarDef { name: scratch.to_string(), offset: bss_cursor, size: 1 });
            globals.insert(
                scratch.to_string(),
                Symbol { name: scratch.to_string(), kind: SymbolKind::Var { offset: bss_cursor, size: 1 } },
            );
            bss_cursor += 1;
        }

        Parser {
            source_name,
            lines,
            pos: 0,
            program,
            bss_cursor,
            globals,
            locals: HashMap::new(),
            current_func: String::new(),
            loop_depth: LoopDepth(0),
        }
    }

    fn err(&self, line_no: usize, message: impl Into<String>) -> EduvmError {
        EduvmError::assembly(self.source_name, line_no, message)
    }

    fn peek(&self) -> Option<&LogicalLine> {
        self.lines.get(self.pos)
    }

    fn next(&mut self) -> LogicalLine {
        let line = self.lines[self.pos].clone();
        self.pos += 1;
        line
    }

    pub fn parse(&mut self) -> Result<Program> {
        while let Some(line) = self.peek().cloned() {
            if line.indent != 0 {
                return Err(self.err(line.line_no, "top-level statements must not be indented"));
            }
            if line.text.starts_with("meta ") {
                self.parse_meta(&line)?;
            } else if line.text.starts_with("depends ") {
                self.parse_depends(&line)?;
            } else if line.text.starts_with("const ") {
                self.parse_const(&line)?;
            } else if line.text.starts_with("var ") {
                self.parse_var(&line)?;
            } else if line.text.starts_with("data ") {
                self.parse_data(&line)?;
            } else if line.text.starts_with("func ") {
                let func = self.parse_function()?;
                self.program.functions.push(func);
            } else {
                return Err(self.err(line.line_no, format!("unknown top-level directive: {}", line.text)));
            }
        }
        Ok(std::mem::take(&mut self.program))
    }

    fn parse_meta(&mut self, line: &LogicalLine) -> Result<()> {
        let rest = line.text["meta ".len()..].trim();
        let (key, value) = rest
            .split_once('=')
            .ok_or_else(|| self.err(line.line_no, "meta expects 'meta key = value'"))?;
        self.program.meta.push((key.trim().to_lowercase(), value.trim().to_string()));
        self.pos += 1;
        Ok(())
    }

    fn parse_depends(&mut self, line: &LogicalLine) -> Result<()> {
        let rest = line.text["depends ".len()..].trim();
        let deps: Vec<String> = rest.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if deps.is_empty() {
            return Err(self.err(line.line_no, "depends requires at least one identifier"));
        }
        self.program.deps.extend(deps);
        self.pos += 1;
        Ok(())
    }

    fn ensure_new_symbol(&self, name: &str, line_no: usize) -> Result<()> {
        if !is_ident(name) {
            return Err(self.err(line_no, format!("invalid identifier '{name}'")));
        }
        if self.globals.contains_key(name) {
            return Err(self.err(line_no, format!("duplicate symbol '{name}'")));
        }
        Ok(())
    }

    fn parse_const(&mut self, line: &LogicalLine) -> Result<()> {
        let rest = line.text["const ".len()..].trim();
        let (name, value) = rest
            .split_once('=')
            .ok_or_else(|| self.err(line.line_no, "const expects 'const NAME = value'"))?;
        let name = name.trim().to_string();
        let value = value.trim().to_string();
        self.ensure_new_symbol(&name, line.line_no)?;
        self.program.consts.push(ConstDef { name: name.clone(), value: value.clone() });
        self.globals.insert(name.clone(), Symbol { name, kind: SymbolKind::Const { value } });
        self.pos += 1;
        Ok(())
    }

    fn parse_var(&mut self, line: &LogicalLine) -> Result<()> {
        let body = line.text["var ".len()..].trim();
        let (name, size) = if let Some(bracket) = body.find('[') {
            if !body.ends_with(']') {
                return Err(self.err(line.line_no, "invalid var declaration; expected var NAME or var NAME[SIZE]"));
            }
            let name = body[..bracket].trim().to_string();
            let size_text = &body[bracket + 1..body.len() - 1];
            let size = parse_int(size_text)
                .ok_or_else(|| self.err(line.line_no, format!("invalid array size: {size_text}")))?;
            if size <= 0 {
                return Err(self.err(line.line_no, "array size must be positive"));
            }
            (name, size as Word)
        } else {
            (body.to_string(), 1)
        };
        self.ensure_new_symbol(&name, line.line_no)?;
        let offset = self.bss_cursor;
        self.program.vars.push(VarDef { name: name.clone(), offset, size });
        self.globals.insert(name.clone(), Symbol { name, kind: SymbolKind::Var { offset, size } });
        self.bss_cursor += size;
        self.pos += 1;
        Ok(())
    }

    fn parse_data(&mut self, line: &LogicalLine) -> Result<()> {
        let rest = line.text["data ".len()..].trim();
        let (name, literal_text) = rest
            .split_once('=')
            .ok_or_else(|| self.err(line.line_no, "data expects 'data NAME = \"...\"'"))?;
        let name = name.trim().to_string();
        self.ensure_new_symbol(&name, line.line_no)?;
        let decoded = parse_string_literal(literal_text.trim())
            .ok_or_else(|| self.err(line.line_no, "data literal must be an ASCII string literal"))?;
        let literal = requote(&decoded);
        self.program.data.push(DataDef { name: name.clone(), literal });
        self.globals.insert(name.clone(), Symbol { name, kind: SymbolKind::Data });
        self.pos += 1;
        Ok(())
    }

    fn parse_function(&mut self) -> Result<FunctionDef> {
        let line = self.next();
        let header = line.text.strip_suffix(':').ok_or_else(|| self.err(line.line_no, "func header must end with ':'"))?;
        let rest = header["func ".len()..].trim();
        let (name, params) = if let Some(paren) = rest.find('(') {
            if !rest.ends_with(')') {
                return Err(self.err(line.line_no, "func parameter list must end with ')'"));
            }
            let name = rest[..paren].trim().to_string();
            let args_text = &rest[paren + 1..rest.len() - 1];
            let params: Vec<String> = if args_text.trim().is_empty() {
                Vec::new()
            } else {
                args_text.split(',').map(|p| p.trim().to_string()).collect()
            };
            (name, params)
        } else {
            (rest.to_string(), Vec::new())
        };
        if !is_ident(&name) {
            return Err(self.err(line.line_no, format!("invalid function name '{name}'")));
        }

        self.current_func = name.clone();
        self.locals.clear();
        for param in &params {
            if !is_ident(param) {
                return Err(self.err(line.line_no, format!("invalid parameter name '{param}'")));
            }
            self.declare_local(param, 1, line.line_no)?;
        }

        let indent = line.indent;
        let body = self.parse_block(indent + 1)?;
        Ok(FunctionDef { name, params, body, locals: self.locals.clone() })
    }

    /// Allocates a one-word (or `size`-word) BSS slot mangled
    /// `<func>.<name>` and binds `name` in the function-local scope.
    fn declare_local(&mut self, name: &str, size: Word, line_no: usize) -> Result<()> {
        if self.locals.contains_key(name) {
            return Err(self.err(line_no, format!("duplicate local '{name}' in function '{}'", self.current_func)));
        }
        let mangled = format!("{}.{}", self.current_func, name);
        let offset = self.bss_cursor;
        self.program.vars.push(VarDef { name: mangled.clone(), offset, size });
        self.bss_cursor += size;
        self.locals.insert(name.to_string(), Symbol { name: mangled, kind: SymbolKind::Var { offset, size } });
        Ok(())
    }

    fn lookup(&self, name: &str, line_no: usize) -> Result<Symbol> {
        if let Some(sym) = self.locals.get(name) {
            return Ok(sym.clone());
        }
        if let Some(sym) = self.globals.get(name) {
            return Ok(sym.clone());
        }
        Err(self.err(line_no, format!("unknown symbol '{name}'")))
    }

    fn parse_block(&mut self, base_indent: usize) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        while let Some(line) = self.peek().cloned() {
            if line.indent < base_indent {
                break;
            }
            if line.indent > base_indent {
                return Err(self.err(line.line_no, "unexpected indentation"));
            }
            if line.text.starts_with("if ") {
                statements.push(self.parse_if(base_indent)?);
                continue;
            }
            if line.text.starts_with("while ") {
                statements.push(self.parse_while(base_indent)?);
                continue;
            }
            if line.text == "else:" {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_condition(&mut self, text: &str, line_no: usize) -> Result<Condition> {
        if let Some(idx) = text.find("==") {
            let lhs = self.parse_expression(text[..idx].trim(), line_no)?;
            let rhs = self.parse_expression(text[idx + 2..].trim(), line_no)?;
            return Ok(Condition::Eq(lhs, rhs));
        }
        if let Some(idx) = text.find("!=") {
            let lhs = self.parse_expression(text[..idx].trim(), line_no)?;
            let rhs = self.parse_expression(text[idx + 2..].trim(), line_no)?;
            return Ok(Condition::NotEq(lhs, rhs));
        }
        Ok(Condition::Value(self.parse_expression(text, line_no)?))
    }

    fn parse_if(&mut self, base_indent: usize) -> Result<Statement> {
        let line = self.next();
        let text = line.text["if ".len()..].trim();
        let text = text.strip_suffix(':').ok_or_else(|| self.err(line.line_no, "if statement must end with ':'"))?.trim();
        if text.is_empty() {
            return Err(self.err(line.line_no, "if requires a condition expression"));
        }
        let cond = self.parse_condition(text, line.line_no)?;
        let then_body = self.parse_block(base_indent + 1)?;
        let mut else_body = None;
        if let Some(next_line) = self.peek().cloned() {
            if next_line.indent == base_indent && next_line.text == "else:" {
                self.pos += 1;
                else_body = Some(self.parse_block(base_indent + 1)?);
            }
        }
        Ok(Statement::If { cond, then_body, else_body })
    }

    fn parse_while(&mut self, base_indent: usize) -> Result<Statement> {
        let line = self.next();
        let text = line.text["while ".len()..].trim();
        let text = text.strip_suffix(':').ok_or_else(|| self.err(line.line_no, "while statement must end with ':'"))?.trim();
        if text.is_empty() {
            return Err(self.err(line.line_no, "while requires a condition expression"));
        }
        let cond = self.parse_condition(text, line.line_no)?;
        self.loop_depth.0 += 1;
        let body = self.parse_block(base_indent + 1)?;
        self.loop_depth.0 -= 1;
        Ok(Statement::While { cond, body })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let line = self.next();
        let text = line.text.as_str();
        if let Some(rest) = text.strip_prefix("let ") {
            return self.parse_let(rest, line.line_no);
        }
        if let Some(rest) = text.strip_prefix("call ") {
            return self.parse_call(rest, line.line_no);
        }
        if text == "return" || text.starts_with("return ") {
            return self.parse_return(text, line.line_no);
        }
        if text == "break" {
            if self.loop_depth.0 == 0 {
                return Err(self.err(line.line_no, "'break' used outside of a loop"));
            }
            return Ok(Statement::Break);
        }
        if text == "continue" {
            if self.loop_depth.0 == 0 {
                return Err(self.err(line.line_no, "'continue' used outside of a loop"));
            }
            return Ok(Statement::Continue);
        }
        if let Some(rest) = text.strip_prefix("asm ") {
            let literal = parse_string_literal(rest.trim())
                .ok_or_else(|| self.err(line.line_no, "asm payload must be a string literal"))?;
            return Ok(Statement::Asm { payload: literal });
        }
        Err(self.err(line.line_no, format!("unknown statement: {text}")))
    }

    fn parse_target(&mut self, text: &str, line_no: usize) -> Result<TargetRef> {
        let (name, index) = split_name_index(text, line_no, |msg| self.err(line_no, msg))?;
        if !is_ident(&name) {
            return Err(self.err(line_no, format!("invalid assignment target '{text}'")));
        }
        // Implicit local: an unknown name inside a function auto-declares
        // a one-word BSS local, per spec.md's implicit-local rule.
        if !self.current_func.is_empty() && self.locals.get(&name).is_none() && self.globals.get(&name).is_none() {
            self.declare_local(&name, 1, line_no)?;
        }
        let symbol = self.lookup(&name, line_no)?;
        if !symbol.kind.is_memory() {
            return Err(self.err(line_no, format!("cannot assign to immediate symbol '{name}'")));
        }
        if let (SymbolKind::Var { size, .. }, Some(IndexExpr::Literal(k))) = (&symbol.kind, &index) {
            if *k >= *size as i64 {
                return Err(self.err(line_no, format!("index {k} out of bounds for array '{name}'")));
            }
        }
        Ok(TargetRef { name, index })
    }

    fn parse_let(&mut self, body: &str, line_no: usize) -> Result<Statement> {
        let (target_part, expr_part, op) = if let Some(idx) = body.find("+=") {
            (&body[..idx], &body[idx + 2..], LetOp::AddAssign)
        } else if let Some(idx) = body.find("-=") {
            (&body[..idx], &body[idx + 2..], LetOp::SubAssign)
        } else if let Some(idx) = body.find('=') {
            (&body[..idx], &body[idx + 1..], LetOp::Assign)
        } else {
            return Err(self.err(line_no, "let statement is missing '='"));
        };
        let target = self.parse_target(target_part.trim(), line_no)?;
        if !matches!(op, LetOp::Assign) {
            let symbol = self.lookup(&target.name, line_no)?;
            let is_pointer = matches!(&symbol.kind, SymbolKind::Var { size, .. } if *size == 1) && target.index.is_some();
            let dynamic_array_index = matches!(
                (&symbol.kind, &target.index),
                (SymbolKind::Var { size, .. }, Some(IndexExpr::Var(_))) if *size > 1
            );
            if is_pointer || dynamic_array_index {
                return Err(self.err(line_no, "'+='/'-=' through a pointer or dynamically-indexed array target is not supported"));
            }
        }
        let expr = self.parse_expression(expr_part.trim(), line_no)?;
        Ok(Statement::Let { target, op, expr })
    }

    fn parse_call(&mut self, body: &str, line_no: usize) -> Result<Statement> {
        if body.is_empty() {
            return Err(self.err(line_no, "call requires a target"));
        }
        let (callee_part, returns) = if let Some(arrow) = body.find("->") {
            let (head, tail) = (body[..arrow].trim(), body[arrow + 2..].trim());
            let returns: Vec<String> = tail.split(',').map(|s| s.trim().to_string()).collect();
            (head, returns)
        } else {
            (body, Vec::new())
        };
        let (callee, args_str) = if let Some(paren) = callee_part.find('(') {
            if !callee_part.trim_end().ends_with(')') {
                return Err(self.err(line_no, "call argument list must end with ')'"));
            }
            let callee = callee_part[..paren].trim().to_string();
            let inner = &callee_part[paren + 1..callee_part.trim_end().len() - 1];
            (callee, inner.to_string())
        } else {
            (callee_part.trim().to_string(), String::new())
        };
        if callee.is_empty() || !callee.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@') {
            return Err(self.err(line_no, format!("invalid callee name: {callee}")));
        }
        let mut args = Vec::new();
        for raw_arg in args_str.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            args.push(self.parse_expression(raw_arg, line_no)?);
        }
        let extern_call = callee.starts_with('@');
        for ret in &returns {
            if ret != "_" && self.locals.get(ret).is_none() && self.globals.get(ret).is_none() {
                self.declare_local(ret, 1, line_no)?;
            }
        }
        Ok(Statement::Call { callee, args, returns, extern_call })
    }

    fn parse_return(&mut self, text: &str, line_no: usize) -> Result<Statement> {
        let body = text.strip_prefix("return").unwrap_or(text).trim();
        if body.is_empty() {
            return Ok(Statement::Return { values: Vec::new() });
        }
        let mut values = Vec::new();
        for part in body.split(',').map(|s| s.trim()) {
            values.push(self.parse_expression(part, line_no)?);
        }
        Ok(Statement::Return { values })
    }

    fn parse_expression(&mut self, text: &str, line_no: usize) -> Result<Expression> {
        if text.is_empty() {
            return Err(self.err(line_no, "empty expression"));
        }
        let mut terms = Vec::new();
        let mut current = String::new();
        let mut sign: i64 = 1;
        let mut depth = 0i32;
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if (ch == '+' || ch == '-') && depth == 0 {
                if current.trim().is_empty() {
                    sign = if ch == '+' { 1 } else { -1 };
                } else {
                    let term_str = current.trim().to_string();
                    terms.push(ExprTerm { sign, term: self.parse_term(&term_str, line_no)? });
                    current.clear();
                    sign = if ch == '+' { 1 } else { -1 };
                }
            } else {
                if ch == '[' {
                    depth += 1;
                } else if ch == ']' {
                    depth = (depth - 1).max(0);
                }
                current.push(ch);
            }
        }
        let term_str = current.trim().to_string();
        if !term_str.is_empty() {
            terms.push(ExprTerm { sign, term: self.parse_term(&term_str, line_no)? });
        }
        if terms.is_empty() {
            return Err(self.err(line_no, "expression has no terms"));
        }
        Ok(Expression { terms })
    }

    fn parse_term(&mut self, text: &str, line_no: usize) -> Result<Term> {
        let mut rest = text;
        let mut derefs = 0;
        while let Some(stripped) = rest.strip_prefix('*') {
            derefs += 1;
            rest = stripped.trim_start();
        }
        if let Some(value) = parse_int(rest) {
            return Ok(Term { derefs, atom: Atom::Literal(value) });
        }
        let (name, index) = split_name_index(rest, line_no, |msg| self.err(line_no, msg))?;
        if !is_ident(&name) {
            return Err(self.err(line_no, format!("unknown symbol or literal '{rest}'")));
        }
        // validate the symbol exists now so errors are reported at parse time
        self.lookup(&name, line_no)?;
        Ok(Term { derefs, atom: Atom::Symbol { name, index } })
    }

    /// The global symbol table (consts, globals, data, ABI slots), for
    /// [`super::codegen`] to combine with a specific function's
    /// [`FunctionDef::locals`] snapshot — the parser's own `locals` map is
    /// scratch space cleared between functions and gone once `parse`
    /// returns, so codegen can't use it directly.
    pub fn globals(&self) -> &HashMap<String, Symbol> {
        &self.globals
    }
}

/// Splits `NAME[index]` into the bare name and an optional index, where
/// `index` is either an integer literal or another identifier (a
/// dynamic index, resolved at codegen time).
fn split_name_index(
    text: &str,
    line_no: usize,
    err: impl Fn(String) -> EduvmError,
) -> Result<(String, Option<IndexExpr>)> {
    if let Some(bracket) = text.find('[') {
        if !text.ends_with(']') {
            return Err(err(format!("invalid indexed reference '{text}'")));
        }
        let name = text[..bracket].trim().to_string();
        let idx_text = text[bracket + 1..text.len() - 1].trim();
        let index = if let Some(n) = parse_int(idx_text) {
            IndexExpr::Literal(n)
        } else if is_ident(idx_text) {
            IndexExpr::Var(idx_text.to_string())
        } else {
            return Err(err(format!("invalid index '{idx_text}' at line {line_no}")));
        };
        Ok((name, Some(index)))
    } else {
        Ok((text.trim().to_string(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mini32::lexer::preprocess;

    fn parse(text: &str) -> Result<Program> {
        let lines = preprocess("t.mini32", text)?;
        let mut parser = Parser::new("t.mini32", lines);
        parser.parse()
    }

    #[test]
    fn globals_and_a_function_parse() {
        let program = parse("const k = 5\nvar counter\nfunc main:\n    let counter = k\n    return counter\n").unwrap();
        assert_eq!(program.consts[0].name, "k");
        assert_eq!(program.vars[0].name, "counter");
        assert_eq!(program.functions[0].name, "main");
        assert_eq!(program.functions[0].body.len(), 2);
    }

    #[test]
    fn function_parameters_become_locals() {
        let program = parse("func add(a, b):\n    return a + b\n").unwrap();
        assert_eq!(program.functions[0].params, vec!["a".to_string(), "b".to_string()]);
        assert!(program.vars.iter().any(|v| v.name == "add.a"));
        assert!(program.vars.iter().any(|v| v.name == "add.b"));
    }

    #[test]
    fn if_else_and_equality_condition_parse() {
        let program = parse("func main:\n    let x = 3\n    if x == 3:\n        let r = 1\n    else:\n        let r = 0\n    return r\n").unwrap();
        let body = &program.functions[0].body;
        assert!(matches!(body[1], Statement::If { cond: Condition::Eq(_, _), .. }));
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        assert!(parse("func main:\n    break\n").is_err());
    }

    #[test]
    fn implicit_local_is_declared_on_first_assignment() {
        let program = parse("func main:\n    let total = 1\n    return total\n").unwrap();
        assert!(program.vars.iter().any(|v| v.name == "main.total"));
    }

    #[test]
    fn duplicate_global_symbol_is_rejected() {
        assert!(parse("const k = 1\nvar k\n").is_err());
    }

    #[test]
    fn array_index_out_of_bounds_is_rejected() {
        assert!(parse("var arr[2]\nfunc main:\n    let arr[5] = 1\n    return\n").is_err());
    }

    #[test]
    fn data_literal_round_trips_through_requoting() {
        let program = parse("data greeting = \"hi\\n\"\n").unwrap();
        assert_eq!(program.data[0].literal, "\"hi\\n\"");
    }

    #[test]
    fn call_with_return_destinations_parses() {
        let program = parse("func main:\n    call divmod(10, 3) -> q, r\n    return q\n").unwrap();
        match &program.functions[0].body[0] {
            Statement::Call { returns, .. } => assert_eq!(returns, &vec!["q".to_string(), "r".to_string()]),
            other => panic!("expected call statement, got {other:?}"),
        }
    }
}
