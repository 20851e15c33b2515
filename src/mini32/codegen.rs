/*!
EASM emission, grounded in `tools/mini32_compiler.py`'s `CodeGenerator`:
the same header/global/function emission shape and `{FUNC}__{KIND}_{N}`
label naming. The stack-based calling convention (parameters, the
multi-value return protocol), indexed/pointer term access, and `==`/`!=`
condition lowering are this crate's own code generation for the parts
spec.md describes but the grounding source doesn't implement, written in
the same emission style as the grounded parts.
*/

use crate::error::Result;

use super::ast::*;
use super::parser::Parser;

const TMP_ADDR: &str = ".__tmp_addr";
const TMP_SUM: &str = ".__tmp_sum";
const TMP_B: &str = ".__tmp_b";

pub struct CodeGenerator<'a> {
    parser: &'a Parser<'a>,
    program: &'a Program,
    lines: Vec<String>,
    label_counter: u32,
    loop_labels: Vec<(String, String)>,
    current_func: String,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(parser: &'a Parser<'a>, program: &'a Program) -> Self {
        CodeGenerator {
            parser,
            program,
            lines: Vec::new(),
            label_counter: 0,
            loop_labels: Vec::new(),
            current_func: String::new(),
        }
    }

    pub fn generate(mut self) -> Result<Vec<String>> {
        self.emit_headers();
        self.emit_globals();
        for func in &self.program.functions.clone() {
            if self.lines.last().is_some_and(|l| !l.is_empty()) {
                self.lines.push(String::new());
            }
            self.current_func = func.name.clone();
            self.emit_label(&func.name);
            self.emit_prologue(func)?;
            self.emit_statements(&func.body)?;
            self.ensure_trailing_ret();
        }
        if self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(String::new());
        }
        Ok(self.lines)
    }

    fn emit_headers(&mut self) {
        let mut meta = self.program.meta.clone();
        if !self.program.deps.is_empty() {
            let deps_str = self.program.deps.join(", ");
            if let Some(existing) = meta.iter_mut().find(|(k, _)| k == "deps") {
                existing.1 = format!("{}, {deps_str}", existing.1);
            } else {
                meta.push(("deps".to_string(), deps_str));
            }
        }
        for (key, value) in &meta {
            self.lines.push(format!(";! {key}: {value}"));
        }
        if !meta.is_empty() {
            self.lines.push(String::new());
        }
    }

    fn emit_globals(&mut self) {
        for c in &self.program.consts {
            self.lines.push(format!("{} = {}", c.name, c.value));
        }
        for v in &self.program.vars {
            let base = if v.offset != 0 { format!(".bss + {}", v.offset) } else { ".bss".to_string() };
            self.lines.push(format!("{} = {base}", v.name));
        }
        for d in &self.program.data {
            self.lines.push(format!(".{} = {}", d.name, d.literal));
        }
        if !self.program.consts.is_empty() || !self.program.vars.is_empty() || !self.program.data.is_empty() {
            self.lines.push(String::new());
        }
    }

    /// Resolves a bare name against the current function's locals (its
    /// `FunctionDef::locals` snapshot), falling back to the parser's
    /// global table. Locals shadow globals, matching [`Parser::lookup`].
    fn resolve(&self, name: &str) -> Symbol {
        let func_locals = self
            .program
            .functions
            .iter()
            .find(|f| f.name == self.current_func)
            .map(|f| &f.locals);
        func_locals
            .and_then(|locals| locals.get(name))
            .or_else(|| self.parser.globals().get(name))
            .cloned()
            .expect("resolved at parse time")
    }

    fn emit_label(&mut self, name: &str) {
        self.lines.push(format!("{name}:"));
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.lines.push(format!("  {}", line.into()));
    }

    fn next_label(&mut self, hint: &str) -> String {
        self.label_counter += 1;
        format!("{}__{}_{}", self.current_func.to_uppercase(), hint, self.label_counter)
    }

    /// Pops parameters off the stack into their BSS slots, preserving the
    /// return address around the pop via `B` (spec.md's calling-convention
    /// sequence: `PLA; MOVAB; PLA; STA .p_n; ...; PLA; STA .p_1; MOVBA; PHA`).
    fn emit_prologue(&mut self, func: &FunctionDef) -> Result<()> {
        if func.params.is_empty() {
            return Ok(());
        }
        self.emit("PLA");
        self.emit("MOVAB");
        for param in func.params.iter().rev() {
            let symbol = self.resolve(param);
            self.emit("PLA");
            self.emit(format!("STA {}", symbol.address_expr(0)));
        }
        self.emit("MOVBA");
        self.emit("PHA");
        Ok(())
    }

    fn emit_statements(&mut self, statements: &[Statement]) -> Result<()> {
        for stmt in statements {
            self.emit_statement(stmt)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Statement) -> Result<()> {
        match stmt {
            Statement::Let { target, op, expr } => self.emit_let(target, op, expr),
            Statement::Call { callee, args, returns, .. } => self.emit_call(callee, args, returns),
            Statement::Return { values } => self.emit_return(values),
            Statement::If { cond, then_body, else_body } => self.emit_if(cond, then_body, else_body.as_deref()),
            Statement::While { cond, body } => self.emit_while(cond, body),
            Statement::Break => self.emit_break(),
            Statement::Continue => self.emit_continue(),
            Statement::Asm { payload } => {
                self.emit_asm(payload);
                Ok(())
            }
        }
    }

    fn target_address_expr(&self, target: &TargetRef) -> String {
        let symbol = self.resolve(&target.name);
        match (&symbol.kind, &target.index) {
            (SymbolKind::Var { size, .. }, Some(IndexExpr::Literal(k))) if *size > 1 => symbol.address_expr(*k),
            _ => symbol.address_expr(0),
        }
    }

    fn emit_let(&mut self, target: &TargetRef, op: &LetOp, expr: &Expression) -> Result<()> {
        // Indexed assignment into a pointer or a dynamically-indexed array
        // needs its address computed into `__tmp_addr` first; everything
        // else (scalars, statically-indexed arrays) writes directly.
        let symbol = self.resolve(&target.name);
        let needs_indirect = matches!(&symbol.kind, SymbolKind::Var { size, .. } if *size == 1) && target.index.is_some()
            || matches!((&symbol.kind, &target.index), (SymbolKind::Var { size, .. }, Some(IndexExpr::Var(_))) if *size > 1);

        if needs_indirect {
            debug_assert!(matches!(op, LetOp::Assign), "parser rejects compound assignment through an indirect target");
            // Compute the effective address, push it (the hardware stack
            // is the only indirect-store path: `SAS` pops an address and
            // writes A there), then evaluate the value and store through it.
            self.emit_indirect_address(&symbol, target.index.as_ref().unwrap());
            self.emit("PHA");
            self.emit_expression(expr, false);
            self.emit("SAS");
            return Ok(());
        }

        let address = self.target_address_expr(target);
        match op {
            LetOp::Assign => self.emit_expression(expr, false),
            LetOp::AddAssign => {
                self.emit(format!("LDA {address}"));
                self.emit_expression(expr, true);
            }
            LetOp::SubAssign => {
                self.emit(format!("LDA {address}"));
                self.emit_expression(&expr.negated(), true);
            }
        }
        self.emit(format!("STA {address}"));
        Ok(())
    }

    /// Computes the effective address of an indexed pointer/array access
    /// into A, stashes it in `__tmp_addr`. Case 2 (pointer): load the
    /// pointer's stored value, add the offset. Case 3 (dynamic index on
    /// an array): compute the offset, add the array's own base address.
    fn emit_indirect_address(&mut self, symbol: &Symbol, index: &IndexExpr) {
        let is_pointer = matches!(&symbol.kind, SymbolKind::Var { size, .. } if *size == 1);
        if is_pointer {
            self.emit(format!("LDA {}", symbol.address_expr(0)));
            match index {
                IndexExpr::Literal(k) => self.emit(format!("ADI {k}")),
                IndexExpr::Var(name) => {
                    let idx_symbol = self.resolve(name);
                    self.emit(format!("ADD {}", idx_symbol.address_expr(0)));
                }
            }
        } else {
            match index {
                IndexExpr::Var(name) => {
                    let idx_symbol = self.resolve(name);
                    self.emit(format!("LDA {}", idx_symbol.address_expr(0)));
                }
                IndexExpr::Literal(k) => self.emit(format!("LDI {k}")),
            }
            self.emit(format!("ADI {}", symbol.address_expr(0)));
        }
    }

    fn emit_call(&mut self, callee: &str, args: &[Expression], returns: &[String]) -> Result<()> {
        for arg in args {
            self.emit_expression(arg, false);
            self.emit("PHA");
        }
        self.emit(format!("JSR {callee}"));
        if returns.len() == 1 {
            if returns[0] != "_" {
                let symbol = self.resolve(&returns[0]);
                self.emit(format!("STA {}", symbol.address_expr(0)));
            }
        } else {
            for dest in returns {
                self.emit("PLA");
                if dest != "_" {
                    let symbol = self.resolve(dest);
                    self.emit(format!("STA {}", symbol.address_expr(0)));
                }
            }
        }
        Ok(())
    }

    fn emit_return(&mut self, values: &[Expression]) -> Result<()> {
        if values.is_empty() {
            self.emit("RET");
            return Ok(());
        }
        if values.len() == 1 {
            self.emit_expression(&values[0], false);
            self.emit("RET");
            return Ok(());
        }
        // Multi-value return: save the return address in B, push values
        // in reverse order so the first listed return ends up on top,
        // then restore the return address and RET.
        self.emit("PLA");
        self.emit("MOVAB");
        for expr in values.iter().rev() {
            self.emit_expression(expr, false);
            self.emit("PHA");
        }
        self.emit("MOVBA");
        self.emit("PHA");
        self.emit("RET");
        Ok(())
    }

    fn emit_condition(&mut self, cond: &Condition, false_label: &str) {
        match cond {
            Condition::Value(expr) => {
                self.emit_expression(expr, false);
                self.emit(format!("JPZ {false_label}"));
            }
            Condition::Eq(lhs, rhs) => {
                self.emit_difference(lhs, rhs);
                self.emit(format!("JNZ {false_label}"));
            }
            Condition::NotEq(lhs, rhs) => {
                self.emit_difference(lhs, rhs);
                self.emit(format!("JPZ {false_label}"));
            }
        }
    }

    fn emit_difference(&mut self, lhs: &Expression, rhs: &Expression) {
        self.emit_expression(lhs, false);
        // Subtract rhs term-by-term, reusing follow-up-term emission so
        // memory/immediate terms both lower correctly.
        for term in &rhs.terms {
            self.emit_followup_term(&ExprTerm { sign: -term.sign, term: term.term.clone() });
        }
    }

    fn emit_if(&mut self, cond: &Condition, then_body: &[Statement], else_body: Option<&[Statement]>) -> Result<()> {
        let end_label = self.next_label("ENDIF");
        let else_label = if else_body.is_some() { self.next_label("ELSE") } else { end_label.clone() };
        self.emit_condition(cond, &else_label);
        self.emit_statements(then_body)?;
        if let Some(else_body) = else_body {
            self.emit(format!("JMP {end_label}"));
            self.emit_label(&else_label);
            self.emit_statements(else_body)?;
            self.emit_label(&end_label);
        } else {
            self.emit_label(&else_label);
        }
        Ok(())
    }

    fn emit_while(&mut self, cond: &Condition, body: &[Statement]) -> Result<()> {
        let start_label = self.next_label("WHILE_START");
        let end_label = self.next_label("WHILE_END");
        self.emit_label(&start_label);
        self.emit_condition(cond, &end_label);
        self.loop_labels.push((start_label.clone(), end_label.clone()));
        self.emit_statements(body)?;
        self.loop_labels.pop();
        self.emit(format!("JMP {start_label}"));
        self.emit_label(&end_label);
        Ok(())
    }

    fn emit_break(&mut self) -> Result<()> {
        let (_, end) = self.loop_labels.last().expect("parser rejects break outside a loop").clone();
        self.emit(format!("JMP {end}"));
        Ok(())
    }

    fn emit_continue(&mut self) -> Result<()> {
        let (start, _) = self.loop_labels.last().expect("parser rejects continue outside a loop").clone();
        self.emit(format!("JMP {start}"));
        Ok(())
    }

    fn emit_asm(&mut self, payload: &str) {
        for line in payload.split('\n') {
            if line.trim().is_empty() {
                self.lines.push(String::new());
            } else if line.starts_with("  ") {
                self.lines.push(line.to_string());
            } else {
                self.emit(line);
            }
        }
    }

    fn emit_expression(&mut self, expr: &Expression, initial_loaded: bool) {
        let mut terms = expr.terms.iter();
        if !initial_loaded {
            if let Some(first) = terms.next() {
                self.emit_first_term(first);
            }
        }
        for term in terms {
            self.emit_followup_term(term);
        }
    }

    fn emit_first_term(&mut self, term: &ExprTerm) {
        match &term.term.atom {
            Atom::Literal(value) => {
                self.emit(format!("LDI {}", term.sign * value));
            }
            Atom::Symbol { name, index } => {
                let symbol = self.resolve(name);
                if symbol.kind.is_memory() {
                    if term.sign == 1 {
                        self.emit_load_symbol(&symbol, index.as_ref());
                    } else {
                        self.emit("LDI 0");
                        self.emit_sub_symbol(&symbol, index.as_ref());
                    }
                } else if term.sign == 1 {
                    self.emit(format!("LDI {}", symbol.immediate_expr()));
                } else {
                    self.emit("LDI 0");
                    self.emit(format!("SUI {}", symbol.immediate_expr()));
                }
            }
        }
        for _ in 0..term.term.derefs {
            self.emit_deref();
        }
    }

    /// `true` when this term needs the running total stashed in
    /// `__tmp_sum` while its own value is computed: a dereference chain,
    /// a dynamically-indexed array, or an indexed pointer access all
    /// compute through `__tmp_addr` themselves and would otherwise
    /// clobber A's running sum.
    fn is_complex_term(&self, term: &Term) -> bool {
        if term.derefs > 0 {
            return true;
        }
        if let Atom::Symbol { name, index: Some(idx) } = &term.atom {
            let symbol = self.resolve(name);
            let is_pointer = matches!(&symbol.kind, SymbolKind::Var { size, .. } if *size == 1);
            let dynamic_array_index =
                matches!((&symbol.kind, idx), (SymbolKind::Var { size, .. }, IndexExpr::Var(_)) if *size > 1);
            return is_pointer || dynamic_array_index;
        }
        false
    }

    fn emit_followup_term(&mut self, term: &ExprTerm) {
        if self.is_complex_term(&term.term) {
            self.emit(format!("STA {TMP_SUM}"));
            self.emit_first_term(&ExprTerm { sign: term.sign, term: term.term.clone() });
            self.emit(format!("ADD {TMP_SUM}"));
            return;
        }
        match &term.term.atom {
            Atom::Literal(value) => {
                let v = term.sign * value;
                if v >= 0 {
                    self.emit(format!("ADI {v}"));
                } else {
                    self.emit(format!("SUI {}", -v));
                }
            }
            Atom::Symbol { name, index } => {
                let symbol = self.resolve(name);
                if symbol.kind.is_memory() {
                    if term.sign == 1 {
                        self.emit_add_symbol(&symbol, index.as_ref());
                    } else {
                        self.emit_sub_symbol(&symbol, index.as_ref());
                    }
                } else if term.sign == 1 {
                    self.emit(format!("ADI {}", symbol.immediate_expr()));
                } else {
                    self.emit(format!("SUI {}", symbol.immediate_expr()));
                }
            }
        }
    }

    fn emit_deref(&mut self) {
        self.emit(format!("STA {TMP_ADDR}"));
        self.emit("LAP");
    }

    fn emit_load_symbol(&mut self, symbol: &Symbol, index: Option<&IndexExpr>) {
        match (&symbol.kind, index) {
            (SymbolKind::Var { size, .. }, Some(IndexExpr::Literal(k))) if *size > 1 => {
                self.emit(format!("LDA {}", symbol.address_expr(*k)));
            }
            (_, Some(idx)) => {
                self.emit_indirect_address(symbol, idx);
                self.emit(format!("STA {TMP_ADDR}"));
                self.emit(format!("LPA {TMP_ADDR}"));
            }
            (_, None) => {
                self.emit(format!("LDA {}", symbol.address_expr(0)));
            }
        }
    }

    /// `ADD`s a memory symbol's value into the running total in A. Plain
    /// and statically-indexed-array accesses add directly from their
    /// known address; a pointer or dynamically-indexed array is loaded
    /// through `__tmp_addr` first, since `ADD` itself only ever reads a
    /// fixed address.
    fn emit_add_symbol(&mut self, symbol: &Symbol, index: Option<&IndexExpr>) {
        match (&symbol.kind, index) {
            (SymbolKind::Var { size, .. }, Some(IndexExpr::Literal(k))) if *size > 1 => {
                self.emit(format!("ADD {}", symbol.address_expr(*k)));
            }
            (_, Some(idx)) => {
                self.emit(format!("STA {TMP_SUM}"));
                self.emit_load_symbol(symbol, Some(idx));
                self.emit(format!("ADD {TMP_SUM}"));
            }
            (_, None) => {
                self.emit(format!("ADD {}", symbol.address_expr(0)));
            }
        }
    }

    /// `SUB`s a memory symbol's value from the value already in A, with
    /// the same indirect-load fallback as [`Self::emit_add_symbol`]. Uses
    /// `__tmp_b` rather than `__tmp_sum` to hold the pending left-hand
    /// value: this runs nested inside `emit_followup_term`'s own
    /// `__tmp_sum` save when called on a negated indexed/pointer term, and
    /// reusing `__tmp_sum` here would clobber that outer save.
    fn emit_sub_symbol(&mut self, symbol: &Symbol, index: Option<&IndexExpr>) {
        match (&symbol.kind, index) {
            (SymbolKind::Var { size, .. }, Some(IndexExpr::Literal(k))) if *size > 1 => {
                self.emit(format!("SUB {}", symbol.address_expr(*k)));
            }
            (_, Some(idx)) => {
                self.emit(format!("STA {TMP_B}"));
                self.emit_load_symbol(symbol, Some(idx));
                self.emit(format!("STA {TMP_ADDR}"));
                self.emit(format!("LDA {TMP_B}"));
                self.emit(format!("SUB {TMP_ADDR}"));
            }
            (_, None) => {
                self.emit(format!("SUB {}", symbol.address_expr(0)));
            }
        }
    }

    fn ensure_trailing_ret(&mut self) {
        for line in self.lines.iter().rev() {
            if line.trim().is_empty() {
                continue;
            }
            if line.trim().to_uppercase() == "RET" {
                return;
            }
            break;
        }
        self.emit("RET");
    }
}
