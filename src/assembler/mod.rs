// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 6502 assembler driver.
//!
//! Owns all per-run state: the image buffer, the lexical scope stack, the
//! unresolved tables, macros, the conditional stack, and the `.include`
//! file stack. Lines stream through the classifier once; operands that
//! reference undefined symbols emit placeholder bytes and register forward
//! references, and symbol definitions cascade resolution back into the
//! image. Errors accumulate per line and never abort the run; the object
//! and side tables are written regardless so partial artifacts stay
//! inspectable.

pub mod cli;
pub mod error;
pub mod listing;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::core::conditional::ConditionalStack;
use crate::core::expr::{self, EvalOutcome, Value, ValueWidth};
use crate::core::imagestore::ImageStore;
use crate::core::macro_processor::{parse_macro_header, MacroProcessor, MAX_EXPANSION_DEPTH};
use crate::core::parser::{classify_line, LineAst};
use crate::core::resolver::{self, UnresolvedExpr, UnresolvedExprTable, UnresolvedSymbol};
use crate::core::scope::{LexicalScope, ScopeResult};
use crate::core::text_utils::{split_comment, split_list};
use crate::core::tokenizer::{tokenize, TokenKind};
use crate::mos6502::handler::encode_instruction;
use crate::mos6502::operand::AddrMode;

use cli::{validate_cli, Cli};
use error::{AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, Severity};
use listing::{ListingLine, ListingWriter};

pub use cli::VERSION;
pub use error::{AsmRunError as RunError, AsmRunReport as RunReport};

/// Run the assembler with command-line arguments.
pub fn run() -> Result<Vec<AsmRunReport>, AsmRunError> {
    let cli = Cli::parse();
    if let Some(config) = &cli.config {
        return crate::multiseg::run(config, cli.listing);
    }
    let paths = validate_cli(&cli)?;

    let mut assembler = Assembler::new();
    assembler.set_source_file(&paths.source);
    assembler.set_object_file(&paths.object);
    assembler.set_listing(cli.listing);
    let report = assembler.assemble()?;
    Ok(vec![report])
}

/// Exported symbol table file for an object.
#[must_use]
pub fn symbol_table_path(object: &Path) -> PathBuf {
    side_path(object, "_symbols.json")
}

/// Exported unresolved-symbol table file for an object.
#[must_use]
pub fn unresolved_path(object: &Path) -> PathBuf {
    side_path(object, "_unresolved.json")
}

/// Exported unresolved-expression table file for an object.
#[must_use]
pub fn unresolved_exprs_path(object: &Path) -> PathBuf {
    side_path(object, "_unresolved_exprs.json")
}

fn side_path(object: &Path, suffix: &str) -> PathBuf {
    let mut name = object.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// One open file in the `.include` stack.
#[derive(Debug)]
struct FileCursor {
    path: PathBuf,
    lines: Vec<String>,
    next: usize,
}

#[derive(Debug)]
struct RepCapture {
    count: u16,
    lines: Vec<String>,
}

/// A complete assembler context. One instance per segment; nothing is
/// shared, which is what allows the multi-segment driver to run instances
/// on parallel worker threads.
pub struct Assembler {
    source_file: Option<PathBuf>,
    object_file: Option<PathBuf>,
    listing_enabled: bool,

    image: ImageStore,
    scope: LexicalScope,
    exprs: UnresolvedExprTable,
    macros: MacroProcessor,
    cond: ConditionalStack,

    files: Vec<FileCursor>,
    current_file: Option<String>,
    current_line: u32,
    current_addr: u16,

    macro_capture: Option<String>,
    rep_capture: Option<RepCapture>,
    expansion_depth: usize,
    ended: bool,

    diagnostics: Vec<Diagnostic>,
    listing_lines: Vec<ListingLine>,
    source_lines: Vec<String>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            source_file: None,
            object_file: None,
            listing_enabled: false,
            image: ImageStore::new(),
            scope: LexicalScope::new(),
            exprs: UnresolvedExprTable::new(),
            macros: MacroProcessor::new(),
            cond: ConditionalStack::new(),
            files: Vec::new(),
            current_file: None,
            current_line: 0,
            current_addr: 0,
            macro_capture: None,
            rep_capture: None,
            expansion_depth: 0,
            ended: false,
            diagnostics: Vec::new(),
            listing_lines: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    pub fn set_source_file(&mut self, path: &Path) {
        self.source_file = Some(path.to_path_buf());
    }

    pub fn set_object_file(&mut self, path: &Path) {
        self.object_file = Some(path.to_path_buf());
    }

    pub fn set_listing(&mut self, enabled: bool) {
        self.listing_enabled = enabled;
    }

    /// Assemble the configured source file and write the object plus side
    /// tables. Missing paths abort before any processing.
    pub fn assemble(&mut self) -> Result<AsmRunReport, AsmRunError> {
        let source = self.source_file.clone().ok_or_else(|| {
            AsmRunError::fatal(AsmErrorKind::Cli, "undefined source file", None)
        })?;
        let object = self.object_file.clone().ok_or_else(|| {
            AsmRunError::fatal(AsmErrorKind::Cli, "undefined object file", None)
        })?;

        let text = fs::read_to_string(&source).map_err(|_| {
            AsmRunError::fatal(
                AsmErrorKind::Io,
                "File doesn't exist",
                Some(&source.display().to_string()),
            )
        })?;
        let lines: Vec<String> = text.lines().map(str::to_string).collect();

        self.run_lines(&source, lines);

        let object_file = fs::File::create(&object).map_err(|err| {
            AsmRunError::fatal(AsmErrorKind::Io, &err.to_string(), Some("object file"))
        })?;
        self.image.write_bin_file(object_file).map_err(|err| {
            AsmRunError::fatal(AsmErrorKind::Io, &err.to_string(), Some("object file"))
        })?;
        self.export_side_files(&object)?;

        if self.listing_enabled {
            self.write_listing(&object)?;
        }

        Ok(AsmRunReport::new(
            std::mem::take(&mut self.diagnostics),
            std::mem::take(&mut self.source_lines),
        ))
    }

    /// Process a source as in-memory lines: the full pipeline short of
    /// file output. State is reset first.
    pub fn run_lines(&mut self, path: &Path, lines: Vec<String>) {
        self.reset();
        self.source_lines = lines.clone();
        self.files.push(FileCursor {
            path: path.to_path_buf(),
            lines,
            next: 0,
        });

        while !self.ended {
            let line = match self.next_line() {
                Some(line) => line,
                None => break,
            };
            self.process_source_line(&line);
        }

        if self.macro_capture.is_some() {
            self.error(AsmErrorKind::Macro, "Found .macro without .endmacro", None);
            self.macro_capture = None;
        }
        if self.rep_capture.is_some() {
            self.error(AsmErrorKind::Directive, "Found .rep without .endrep", None);
            self.rep_capture = None;
        }
        if !self.cond.is_empty() {
            self.warning(AsmErrorKind::Conditional, "Found .if without .endif", None);
            self.cond.clear();
        }

        // Entries merged up from closed scopes may name symbols that were
        // already defined when the merge happened; sweep them now.
        self.resolve_pending();
        self.exprs.origin = self.image.origin();
    }

    fn reset(&mut self) {
        self.image.clear();
        self.scope.reset();
        self.exprs.clear();
        self.macros.clear();
        self.cond.clear();
        self.files.clear();
        self.current_file = None;
        self.current_line = 0;
        self.current_addr = 0;
        self.macro_capture = None;
        self.rep_capture = None;
        self.expansion_depth = 0;
        self.ended = false;
        self.diagnostics.clear();
        self.listing_lines.clear();
        self.source_lines.clear();
    }

    fn next_line(&mut self) -> Option<String> {
        loop {
            let cursor = self.files.last_mut()?;
            if cursor.next >= cursor.lines.len() {
                self.files.pop();
                continue;
            }
            let line = cursor.lines[cursor.next].clone();
            cursor.next += 1;
            self.current_line = cursor.next as u32;
            self.current_file = Some(cursor.path.display().to_string());
            return Some(line);
        }
    }

    fn process_source_line(&mut self, raw: &str) {
        let addr = self.current_addr;
        let before = self.image.num_bytes();
        let line_num = self.current_line;
        let (code, _) = split_comment(raw);
        let code = code.to_string();
        self.process_code(&code);
        if self.listing_enabled {
            self.listing_lines.push(ListingLine {
                addr,
                bytes: self.image.bytes()[before..].to_vec(),
                line_num,
                source: raw.to_string(),
            });
        }
    }

    /// Shared entry for physical lines, macro expansions, repeat replays,
    /// and the remainder after a `name:` label.
    fn process_code(&mut self, code: &str) {
        let trimmed = code.trim();

        if self.cond.skipping() {
            // Structural conditionals are still tracked so nesting stays
            // balanced inside suppressed blocks.
            match directive_word(trimmed).as_deref() {
                Some("if") | Some("ifdef") | Some("ifndef") => {
                    if !self.cond.push(false) {
                        self.error(
                            AsmErrorKind::Conditional,
                            "Too many nested conditionals",
                            None,
                        );
                    }
                }
                Some("else") => {
                    let _ = self.cond.flip_last();
                }
                Some("endif") => {
                    let _ = self.cond.pop();
                }
                _ => {}
            }
            return;
        }

        if self.macro_capture.is_some() {
            if trimmed.eq_ignore_ascii_case(".endmacro") {
                self.macro_capture = None;
                return;
            }
            if directive_word(trimmed).as_deref() == Some("macro") {
                self.error(
                    AsmErrorKind::Macro,
                    "Nested macro definitions are not allowed",
                    None,
                );
                return;
            }
            if trimmed.is_empty() {
                return;
            }
            let name = self.macro_capture.clone().unwrap_or_default();
            self.macros.push_line(&name, trimmed);
            return;
        }

        if self.rep_capture.is_some() {
            if trimmed.eq_ignore_ascii_case(".endrep") {
                self.replay_rep();
                return;
            }
            if directive_word(trimmed).as_deref() == Some("rep") {
                self.error(
                    AsmErrorKind::Directive,
                    "Nested repeat blocks are not allowed",
                    None,
                );
                return;
            }
            if let Some(capture) = self.rep_capture.as_mut() {
                capture.lines.push(trimmed.to_string());
            }
            return;
        }

        self.dispatch_line(code);
    }

    fn dispatch_line(&mut self, code: &str) {
        let ast = match classify_line(code) {
            Ok(ast) => ast,
            Err(err) => {
                self.error(AsmErrorKind::Parser, &err.message, None);
                return;
            }
        };
        match ast {
            LineAst::Empty => {}
            LineAst::ScopeOpen => {
                if self.scope.push() == ScopeResult::TooDeep {
                    self.error(AsmErrorKind::Scope, "Too many nested local scopes", None);
                }
            }
            LineAst::ScopeClose => {
                if self.scope.pop() == ScopeResult::NoScope {
                    self.error(AsmErrorKind::Scope, "'}' without '{'", None);
                }
            }
            LineAst::Label { name, rest } => {
                self.define_symbol(&name, Value::Word(self.current_addr));
                if !rest.is_empty() {
                    self.dispatch_line(&rest);
                }
            }
            LineAst::MemReserve { name, count } => self.handle_mem_reserve(&name, &count),
            LineAst::Directive { name, value } => self.handle_directive(&name, &value),
            LineAst::Constant { name, expr } => self.handle_constant(&name, &expr),
            LineAst::Instruction {
                label,
                mnemonic,
                operands,
            } => self.handle_instruction(label.as_deref(), &mnemonic, &operands),
            LineAst::MacroCall { name, args } => self.handle_macro_call(&name, &args),
        }
    }

    /// Bind a symbol in the current frame and cascade resolution.
    fn define_symbol(&mut self, name: &str, value: Value) {
        match self.scope.bind(name, value) {
            ScopeResult::Ok => {
                let errors =
                    resolver::resolve_defined(name, &mut self.scope, &mut self.exprs, &mut self.image);
                for err in errors {
                    self.error_from(err);
                }
            }
            ScopeResult::Duplicate => {
                self.error(AsmErrorKind::Symbol, "Label already declared", Some(name));
            }
            _ => {}
        }
    }

    fn handle_constant(&mut self, name: &str, expr_text: &str) {
        match self.eval(expr_text) {
            Ok(EvalOutcome::Value(value)) => self.define_symbol(name, value),
            Ok(EvalOutcome::Undefined(names)) => {
                {
                    let record = self.scope.pending_entry(name);
                    record.expr = Some(expr_text.to_string());
                    record.nbr_undefined = names.len() as u16;
                }
                for dep in &names {
                    let entry = self.scope.pending_entry(dep);
                    if !entry.depending_symbols.iter().any(|n| n == name) {
                        entry.depending_symbols.push(name.to_string());
                    }
                }
            }
            Err(err) => self.error(AsmErrorKind::Expression, &err.message, Some(name)),
        }
    }

    fn handle_mem_reserve(&mut self, name: &str, count_text: &str) {
        let count = match self.eval_immediate(count_text) {
            Some(value) => value.as_word(),
            None => return,
        };
        if self.scope.defined_in_current(name) {
            self.error(AsmErrorKind::Symbol, "Label already declared", Some(name));
            return;
        }
        let value = self.scope.mem_area_mut().reserve(count);
        self.define_symbol(name, value);
    }

    fn handle_instruction(&mut self, label: Option<&str>, mnemonic: &str, operands: &str) {
        if let Some(label) = label {
            self.define_symbol(label, Value::Word(self.current_addr));
        }
        // A macro can shadow a mnemonic; the invocation wins, as the
        // catch-all pattern would have routed any non-mnemonic name here.
        if self.macros.contains(mnemonic) {
            self.handle_macro_call(mnemonic, operands);
            return;
        }

        let outcome = encode_instruction(mnemonic, operands, self.current_addr, &self.scope);
        if let Some(err) = outcome.error {
            self.error_from(err);
        }
        if outcome.bytes.is_empty() {
            return;
        }
        let position = self.image.position();
        self.image.emit(&outcome.bytes);
        if let Some(pending) = outcome.pending {
            self.register_pending_expr(
                position + 1,
                pending.expr,
                pending.width,
                Some(pending.mode),
                &pending.undefined,
            );
        }
        self.current_addr = self.current_addr.wrapping_add(outcome.bytes.len() as u16);
    }

    fn handle_macro_call(&mut self, name: &str, args: &str) {
        if self.expansion_depth >= MAX_EXPANSION_DEPTH {
            self.error(
                AsmErrorKind::Macro,
                "Macro expansion exceeded maximum depth",
                Some(name),
            );
            return;
        }
        match self.macros.expand(name, args) {
            Ok(lines) => {
                self.expansion_depth += 1;
                for line in lines {
                    if self.ended {
                        break;
                    }
                    self.process_code(&line);
                }
                self.expansion_depth -= 1;
            }
            Err(err) => self.error(AsmErrorKind::Macro, &err.message, Some(name)),
        }
    }

    fn handle_directive(&mut self, name: &str, value: &str) {
        match name {
            "org" => {
                if let Some(value) = self.eval_immediate(value) {
                    let addr = value.as_word();
                    self.image.set_origin(addr);
                    self.exprs.origin = addr;
                    self.current_addr = addr;
                }
            }
            "memarea" => {
                if let Some(value) = self.eval_immediate(value) {
                    self.scope.mem_area_mut().set(value);
                }
            }
            "byte" => self.handle_data_byte(value),
            "word" => self.handle_data_word(value),
            "include" => self.handle_include(value),
            "incbin" => self.handle_incbin(value),
            "macro" => match parse_macro_header(value) {
                Some((name, params)) => match self.macros.define(&name, params) {
                    Ok(()) => self.macro_capture = Some(name),
                    Err(err) => {
                        self.error(AsmErrorKind::Macro, &err.message, Some(&name));
                        // Capture into a nonexistent macro so the body is
                        // swallowed without touching the existing one.
                        self.macro_capture = Some(String::new());
                    }
                },
                None => self.error(AsmErrorKind::Macro, "Syntax Error", None),
            },
            "endmacro" => {
                self.error(AsmErrorKind::Macro, ".endmacro without .macro", None);
            }
            "if" => match self.eval(value) {
                Ok(EvalOutcome::Value(value)) => self.push_cond(value.truth()),
                Ok(EvalOutcome::Undefined(_)) => {
                    self.error(AsmErrorKind::Symbol, "Undefined symbol", Some(value));
                    self.push_cond(true);
                }
                Err(err) => {
                    self.error(AsmErrorKind::Expression, &err.message, None);
                    self.push_cond(true);
                }
            },
            "ifdef" => {
                let defined = self.scope.lookup(value.trim()).is_some();
                self.push_cond(defined);
            }
            "ifndef" => {
                let defined = self.scope.lookup(value.trim()).is_some();
                self.push_cond(!defined);
            }
            "else" => {
                if !self.cond.flip_last() {
                    self.error(AsmErrorKind::Conditional, ".else without .if", None);
                }
            }
            "endif" => {
                if !self.cond.pop() {
                    self.error(AsmErrorKind::Conditional, ".endif without .if", None);
                }
            }
            "rep" => {
                if let Some(value) = self.eval_immediate(value) {
                    self.rep_capture = Some(RepCapture {
                        count: value.as_word(),
                        lines: Vec::new(),
                    });
                }
            }
            "endrep" => {
                self.error(AsmErrorKind::Directive, ".endrep without .rep", None);
            }
            "end" => self.ended = true,
            // Unknown directives are ignored.
            _ => {}
        }
    }

    fn replay_rep(&mut self) {
        let capture = match self.rep_capture.take() {
            Some(capture) => capture,
            None => return,
        };
        'replay: for _ in 0..capture.count {
            for line in &capture.lines {
                if self.ended {
                    break 'replay;
                }
                self.process_code(line);
            }
        }
    }

    fn push_cond(&mut self, truth: bool) {
        if !self.cond.push(truth) {
            self.error(
                AsmErrorKind::Conditional,
                "Too many nested conditionals",
                None,
            );
        }
    }

    fn handle_data_byte(&mut self, value: &str) {
        if value.trim().is_empty() {
            self.error(AsmErrorKind::Directive, "Error in insert data byte", None);
            return;
        }
        for item in split_list(value) {
            let item = item.trim();
            if item.starts_with('"') || item.starts_with('\'') {
                let tokens = tokenize(item);
                match tokens.as_slice() {
                    [token] => {
                        if let TokenKind::Str(lit) = &token.kind {
                            for byte in &lit.bytes {
                                self.image.emit_byte(*byte);
                            }
                            self.current_addr =
                                self.current_addr.wrapping_add(lit.bytes.len() as u16);
                            continue;
                        }
                        self.error(AsmErrorKind::Directive, "Error in insert data byte", None);
                    }
                    _ => {
                        self.error(AsmErrorKind::Directive, "Error in insert data byte", None)
                    }
                }
                continue;
            }
            match self.eval(item) {
                Ok(EvalOutcome::Value(Value::Word(_))) => {
                    self.error(
                        AsmErrorKind::Directive,
                        "Error in insert data byte",
                        Some(item),
                    );
                }
                Ok(EvalOutcome::Value(value)) => {
                    self.image.emit_byte(value.low_byte());
                    self.current_addr = self.current_addr.wrapping_add(1);
                }
                Ok(EvalOutcome::Undefined(names)) => {
                    let position = self.image.position();
                    self.image.emit_byte(0);
                    self.register_pending_expr(
                        position,
                        item.to_string(),
                        ValueWidth::Byte,
                        None,
                        &names,
                    );
                    self.current_addr = self.current_addr.wrapping_add(1);
                }
                Err(_) => {
                    self.error(
                        AsmErrorKind::Directive,
                        "Error in insert data byte",
                        Some(item),
                    );
                }
            }
        }
    }

    fn handle_data_word(&mut self, value: &str) {
        if value.trim().is_empty() {
            self.error(AsmErrorKind::Directive, "Error in insert data word", None);
            return;
        }
        for item in split_list(value) {
            let item = item.trim();
            match self.eval(item) {
                Ok(EvalOutcome::Value(value)) => {
                    let word = value.as_word();
                    self.image.emit(&[(word & 0xff) as u8, (word >> 8) as u8]);
                    self.current_addr = self.current_addr.wrapping_add(2);
                }
                Ok(EvalOutcome::Undefined(names)) => {
                    let position = self.image.position();
                    self.image.emit(&[0, 0]);
                    self.register_pending_expr(
                        position,
                        item.to_string(),
                        ValueWidth::Word,
                        None,
                        &names,
                    );
                    self.current_addr = self.current_addr.wrapping_add(2);
                }
                Err(_) => {
                    self.error(
                        AsmErrorKind::Directive,
                        "Error in insert data word",
                        Some(item),
                    );
                }
            }
        }
    }

    fn handle_include(&mut self, value: &str) {
        let path = match self.resolve_file(value) {
            Some(path) => path,
            None => return,
        };
        match fs::read_to_string(&path) {
            Ok(text) => {
                let lines: Vec<String> = text.lines().map(str::to_string).collect();
                self.files.push(FileCursor {
                    path,
                    lines,
                    next: 0,
                });
            }
            Err(_) => self.error(
                AsmErrorKind::Io,
                "File doesn't exist",
                Some(&path.display().to_string()),
            ),
        }
    }

    fn handle_incbin(&mut self, value: &str) {
        let path = match self.resolve_file(value) {
            Some(path) => path,
            None => return,
        };
        match fs::read(&path) {
            Ok(bytes) => {
                self.image.emit(&bytes);
                self.current_addr = self.current_addr.wrapping_add(bytes.len() as u16);
            }
            Err(_) => self.error(
                AsmErrorKind::Io,
                "File doesn't exist",
                Some(&path.display().to_string()),
            ),
        }
    }

    /// Resolve an include/incbin filename relative to the including file.
    fn resolve_file(&mut self, value: &str) -> Option<PathBuf> {
        let name = value.trim().replace('"', "");
        if name.is_empty() {
            self.error(AsmErrorKind::Io, "File doesn't exist", None);
            return None;
        }
        let base = self
            .files
            .last()
            .and_then(|cursor| cursor.path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Some(base.join(name))
    }

    fn register_pending_expr(
        &mut self,
        position: u16,
        expr: String,
        width: ValueWidth,
        addr_mode: Option<AddrMode>,
        undefined: &[String],
    ) {
        self.exprs.insert(UnresolvedExpr {
            position,
            expr,
            width,
            addr_mode,
            nbr_undefined: undefined.len() as u16,
        });
        for name in undefined {
            let entry = self.scope.pending_entry(name);
            if !entry.expr_positions.contains(&position) {
                entry.expr_positions.push(position);
            }
        }
    }

    fn eval(&self, text: &str) -> Result<EvalOutcome, expr::EvalError> {
        expr::eval_tokens(&tokenize(text), &self.scope)
    }

    /// Evaluate an expression that must resolve right now (`.org`,
    /// `.memarea`, `.rep`, `.res`, `.if`): forward references are errors.
    fn eval_immediate(&mut self, text: &str) -> Option<Value> {
        match self.eval(text) {
            Ok(EvalOutcome::Value(value)) => Some(value),
            Ok(EvalOutcome::Undefined(_)) => {
                self.error(AsmErrorKind::Symbol, "Undefined symbol", Some(text));
                None
            }
            Err(err) => {
                self.error(AsmErrorKind::Expression, &err.message, None);
                None
            }
        }
    }

    fn error(&mut self, kind: AsmErrorKind, msg: &str, param: Option<&str>) {
        let err = AsmError::new(kind, msg, param);
        self.error_from(err);
    }

    fn error_from(&mut self, err: AsmError) {
        self.diagnostics.push(
            Diagnostic::new(self.current_line, Severity::Error, err)
                .with_file(self.current_file.clone()),
        );
    }

    fn warning(&mut self, kind: AsmErrorKind, msg: &str, param: Option<&str>) {
        let err = AsmError::new(kind, msg, param);
        self.diagnostics.push(
            Diagnostic::new(self.current_line, Severity::Warning, err)
                .with_file(self.current_file.clone()),
        );
    }

    fn export_side_files(&mut self, object: &Path) -> Result<(), AsmRunError> {
        let symbols = self.scope.global_symbols();
        if !symbols.is_empty() {
            write_json(&symbol_table_path(object), &symbols)?;
        }
        let pending = self.scope.global_pending();
        if !pending.is_empty() {
            write_json(&unresolved_path(object), &pending)?;
        }
        if !self.exprs.is_empty() {
            self.exprs.origin = self.image.origin();
            write_json(&unresolved_exprs_path(object), &self.exprs)?;
        }
        Ok(())
    }

    fn write_listing(&mut self, object: &Path) -> Result<(), AsmRunError> {
        let path = object.with_extension("lst");
        let file = fs::File::create(&path).map_err(|err| {
            AsmRunError::fatal(AsmErrorKind::Io, &err.to_string(), Some("listing file"))
        })?;
        let mut writer = ListingWriter::new(file);
        let errors = self
            .diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .count();
        let warnings = self.diagnostics.len() - errors;
        let lines = &self.listing_lines;
        let result = (|| -> std::io::Result<()> {
            writer.header(&format!("forge65 v{VERSION}"))?;
            for line in lines {
                writer.write_line(line)?;
            }
            writer.footer(errors, warnings)
        })();
        result.map_err(|err| {
            AsmRunError::fatal(AsmErrorKind::Io, &err.to_string(), Some("listing file"))
        })
    }

    // Read-back surface used by tests and the multi-segment driver.

    #[must_use]
    pub fn output(&self) -> &[u8] {
        self.image.bytes()
    }

    #[must_use]
    pub fn origin(&self) -> u16 {
        self.image.origin()
    }

    #[must_use]
    pub fn symbols(&self) -> BTreeMap<String, Value> {
        self.scope.global_symbols()
    }

    #[must_use]
    pub fn unresolved_symbols(&self) -> BTreeMap<String, UnresolvedSymbol> {
        self.scope.global_pending()
    }

    #[must_use]
    pub fn unresolved_exprs(&self) -> &UnresolvedExprTable {
        &self.exprs
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // Multi-segment resolution entry points: re-populate a fresh context
    // from previously exported artifacts and re-run the cascade.

    pub fn load_object(&mut self, bytes: Vec<u8>) {
        self.image.load(bytes);
    }

    pub fn load_symbol_table(&mut self, symbols: BTreeMap<String, Value>) {
        self.scope.set_global_symbols(symbols);
    }

    pub fn load_unresolved(&mut self, pending: BTreeMap<String, UnresolvedSymbol>) {
        self.scope.set_global_pending(pending);
    }

    pub fn load_unresolved_exprs(&mut self, table: UnresolvedExprTable) {
        self.image.set_origin(table.origin);
        self.exprs = table;
    }

    /// Sweep the pending table, resolving every name that has a definition
    /// by now and patching the image.
    pub fn resolve_pending(&mut self) {
        let errors = resolver::resolve_all(&mut self.scope, &mut self.exprs, &mut self.image);
        for err in errors {
            self.error_from(err);
        }
    }
}

fn directive_word(line: &str) -> Option<String> {
    let rest = line.strip_prefix('.')?;
    let end = rest
        .bytes()
        .position(|c| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(rest[..end].to_ascii_lowercase())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), AsmRunError> {
    let text = serde_json::to_string_pretty(value).map_err(|err| {
        AsmRunError::fatal(AsmErrorKind::Io, &err.to_string(), Some("side table"))
    })?;
    fs::write(path, text).map_err(|err| {
        AsmRunError::fatal(
            AsmErrorKind::Io,
            &err.to_string(),
            Some(&path.display().to_string()),
        )
    })
}
